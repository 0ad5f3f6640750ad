//! ALSA playback sink, opened per stream format and reopened by the relay
//! loop whenever the format changes.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};

use crate::error::OutputError;
use crate::format::StreamFormat;
use crate::relay::{OutputBackend, PlaybackSink};

pub struct AlsaOutput {
    device: String,
}

impl AlsaOutput {
    pub fn new(device: &str) -> Self {
        Self { device: device.to_string() }
    }
}

impl OutputBackend for AlsaOutput {
    type Sink = OutputSink;

    fn open(&mut self, format: &StreamFormat) -> Result<OutputSink, OutputError> {
        OutputSink::open(&self.device, format)
    }
}

/// One open playback device. Dropping it closes the PCM handle.
pub struct OutputSink {
    pcm: PCM,
    channels: usize,
    scratch: Vec<i16>,
}

impl OutputSink {
    fn open(device: &str, format: &StreamFormat) -> Result<Self, OutputError> {
        log::info!(
            "16 bit, {} channels, {} Hz",
            format.channels,
            format.sample_rate
        );

        let pcm = PCM::new(device, Direction::Playback, false)
            .map_err(|e| OutputError::Open(format!("'{device}': {e}")))?;
        let rate = configure(&pcm, format)
            .map_err(|e| OutputError::Open(format!("'{device}': {e}")))?;
        if rate != format.sample_rate {
            log::warn!(
                "playback device negotiated {rate} Hz instead of {} Hz",
                format.sample_rate
            );
        }

        Ok(Self {
            pcm,
            channels: format.channels as usize,
            scratch: Vec::new(),
        })
    }
}

impl PlaybackSink for OutputSink {
    fn play(&mut self, bytes: &[u8]) -> Result<(), OutputError> {
        self.scratch.clear();
        self.scratch.reserve(bytes.len() / 2);
        for pair in bytes.chunks_exact(2) {
            self.scratch.push(i16::from_le_bytes([pair[0], pair[1]]));
        }

        let io = self.pcm.io_i16().map_err(|e| OutputError::Playback(e.to_string()))?;
        let total_frames = self.scratch.len() / self.channels;
        let mut frames_written = 0;
        let mut retries = 0u32;

        // Short writes and XRUNs are recovered in place; a device that
        // keeps failing bubbles up so the relay loop can rebuild the path.
        while frames_written < total_frames {
            let offset = frames_written * self.channels;
            match io.writei(&self.scratch[offset..]) {
                Ok(n) => {
                    frames_written += n;
                    retries = 0;
                }
                Err(e) => {
                    log::warn!("ALSA playback error: {e}, recovering...");
                    retries += 1;
                    if retries > 3 {
                        return Err(OutputError::Playback(e.to_string()));
                    }
                    self.pcm
                        .prepare()
                        .map_err(|e| OutputError::Playback(e.to_string()))?;
                }
            }
        }
        Ok(())
    }
}

fn configure(pcm: &PCM, format: &StreamFormat) -> alsa::Result<u32> {
    {
        let hwp = HwParams::any(pcm)?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(format.channels)?;
        hwp.set_rate_near(format.sample_rate, ValueOr::Nearest)?;
        pcm.hw_params(&hwp)?;
    }
    let hwp = pcm.hw_params_current()?;
    hwp.get_rate()
}
