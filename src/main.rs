//! spdif-relay - relay audio from an ALSA capture device to a playback
//! device, decoding IEC 61937 compressed bursts (S/PDIF passthrough) on the
//! fly and falling back to raw PCM when no burst is present.

mod audio;
mod config;
mod decode;
mod error;
mod format;
mod normalize;
mod relay;
mod sync;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use audio::{AlsaCapture, AlsaOutput};
use config::{MIN_SCRATCH_BYTES, RelayConfig};
use decode::SymphoniaFactory;
use relay::RelayLoop;

#[derive(Parser, Debug)]
#[command(name = "spdif-relay")]
#[command(about = "Relay S/PDIF audio from an ALSA capture device, decoding \
                   IEC 61937 compressed bursts to PCM on the fly")]
#[command(version)]
struct Args {
    /// ALSA capture device carrying the S/PDIF signal (e.g. "hw:1,0")
    #[arg(short, long, required_unless_present = "test")]
    input: Option<String>,

    /// ALSA playback device
    #[arg(short, long, default_value = "default")]
    output: String,

    /// Play a test tone on each output channel and exit
    #[arg(short, long)]
    test: bool,

    /// Scratch capacity in bytes for burst synchronization
    #[arg(long, default_value_t = 32768)]
    scratch_bytes: usize,

    /// Delay in milliseconds before reopening devices after a fault
    #[arg(long, default_value_t = 1000)]
    backoff_ms: u64,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let mut output = AlsaOutput::new(&args.output);

    if args.test {
        audio::tone::run_speaker_test(&mut output).context("speaker test failed")?;
        return Ok(());
    }

    let Some(input) = args.input else {
        bail!("an input device is required unless --test is given");
    };
    if args.scratch_bytes < MIN_SCRATCH_BYTES {
        bail!(
            "--scratch-bytes {} cannot hold the largest burst slot ({} bytes)",
            args.scratch_bytes,
            MIN_SCRATCH_BYTES
        );
    }

    let config = RelayConfig {
        capture_device: input,
        playback_device: args.output,
        scratch_bytes: args.scratch_bytes,
        retry_backoff: Duration::from_millis(args.backoff_ms),
    };

    log::info!(
        "spdif-relay starting — capture: \"{}\", playback: \"{}\", scratch: {} bytes",
        config.capture_device,
        config.playback_device,
        config.scratch_bytes,
    );

    let capture = AlsaCapture::new(&config.capture_device);
    let mut relay = RelayLoop::new(capture, output, SymphoniaFactory, config);
    relay.run()
}
