//! ALSA capture device exposed as a blocking byte source.
//!
//! The S/PDIF envelope is always 2-channel 16-bit PCM at 48 kHz; the frame
//! synchronizer consumes it as an undifferentiated byte stream, so period
//! reads are serialized to little-endian bytes behind `std::io::Read`.

use std::io::{self, Read};

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};

use crate::error::CaptureError;
use crate::relay::CaptureBackend;

const CAPTURE_RATE: u32 = 48000;
const CAPTURE_CHANNELS: u32 = 2;

pub struct AlsaCapture {
    device: String,
}

impl AlsaCapture {
    pub fn new(device: &str) -> Self {
        Self { device: device.to_string() }
    }
}

impl CaptureBackend for AlsaCapture {
    type Source = CaptureSource;

    fn open(&mut self) -> Result<CaptureSource, CaptureError> {
        CaptureSource::open(&self.device)
    }
}

pub struct CaptureSource {
    pcm: PCM,
    period: Vec<i16>,
    buf: Vec<u8>,
    pos: usize,
}

impl CaptureSource {
    fn open(device: &str) -> Result<Self, CaptureError> {
        let pcm = PCM::new(device, Direction::Capture, false)
            .map_err(|e| CaptureError::Open(format!("'{device}': {e}")))?;

        let (rate, period_size) =
            configure(&pcm).map_err(|e| CaptureError::Open(format!("'{device}': {e}")))?;
        if rate != CAPTURE_RATE {
            log::warn!("capture device negotiated {rate} Hz instead of {CAPTURE_RATE} Hz");
        }

        log::info!(
            "capture open: device={device}, rate={rate}, channels={CAPTURE_CHANNELS}, period={period_size}"
        );

        Ok(Self {
            pcm,
            period: vec![0i16; period_size * CAPTURE_CHANNELS as usize],
            buf: Vec::new(),
            pos: 0,
        })
    }

    /// Pull one period from the device into the byte buffer. Returns the
    /// number of frames read; 0 is end-of-stream.
    fn fill(&mut self) -> io::Result<usize> {
        let io_dev = self.pcm.io_i16().map_err(io::Error::other)?;
        let mut recovered = false;
        loop {
            match io_dev.readi(&mut self.period) {
                Ok(frames) => {
                    let samples = frames * CAPTURE_CHANNELS as usize;
                    self.buf.clear();
                    self.buf.reserve(samples * 2);
                    for s in &self.period[..samples] {
                        self.buf.extend_from_slice(&s.to_le_bytes());
                    }
                    self.pos = 0;
                    return Ok(frames);
                }
                Err(e) if !recovered => {
                    log::warn!("ALSA capture error: {e}, recovering...");
                    self.pcm.prepare().map_err(io::Error::other)?;
                    recovered = true;
                }
                Err(e) => return Err(io::Error::other(e)),
            }
        }
    }
}

impl Read for CaptureSource {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.buf.len() {
            if self.fill()? == 0 {
                return Ok(0);
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Negotiate hardware parameters and read back what the device accepted.
fn configure(pcm: &PCM) -> alsa::Result<(u32, usize)> {
    {
        let hwp = HwParams::any(pcm)?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(CAPTURE_CHANNELS)?;
        hwp.set_rate_near(CAPTURE_RATE, ValueOr::Nearest)?;
        pcm.hw_params(&hwp)?;
    }
    let hwp = pcm.hw_params_current()?;
    Ok((hwp.get_rate()?, hwp.get_period_size()? as usize))
}
