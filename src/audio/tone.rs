//! Speaker self-test: one sine burst per output channel, so the wiring and
//! channel order can be verified without any capture input.

use std::f64::consts::PI;

use crate::error::OutputError;
use crate::format::{SampleFormat, StreamFormat};
use crate::relay::{OutputBackend, PlaybackSink};

const RATE: u32 = 48000;
const CHANNELS: usize = 6;
/// 1/10 of a second per buffer.
const BUFLEN: usize = 4800;

/// Play 2 seconds of tone and 1 second of silence on each channel in turn,
/// in the same order the playback sink lays channels out.
pub fn run_speaker_test<O: OutputBackend>(output: &mut O) -> Result<(), OutputError> {
    let format = StreamFormat {
        channels: CHANNELS as u32,
        sample_rate: RATE,
        layout: 0x3f,
        sample_format: SampleFormat::PcmS16,
    };
    let mut sink = output.open(&format)?;

    // Interleaved slot per speaker in the L,R,C,LFE,BL,BR device layout.
    let map: [(&str, f64, usize); CHANNELS] = [
        ("left", 500.0, 0),
        ("center", 500.0, 2),
        ("right", 500.0, 1),
        ("rear right", 500.0, 5),
        ("rear left", 500.0, 4),
        ("sub", 50.0, 3),
    ];

    for (name, freq, slot) in map {
        log::info!("channel {slot}: {name}");

        let mut samples = vec![0i16; BUFLEN * CHANNELS];
        for i in 0..BUFLEN {
            let amplitude = (i16::MAX / 10) as f64;
            samples[i * CHANNELS + slot] =
                (amplitude * (2.0 * PI * freq * i as f64 / RATE as f64).cos()) as i16;
        }
        let tone: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let silence = vec![0u8; tone.len()];

        for i in 0..30 {
            let chunk = if i < 20 { &tone } else { &silence };
            sink.play(chunk)?;
        }
    }
    Ok(())
}
