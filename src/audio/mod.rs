//! ALSA device layer: the capture device as a blocking byte source, the
//! playback sink with XRUN recovery, and the speaker self-test.

mod capture;
mod output;
pub mod tone;

pub use capture::AlsaCapture;
pub use output::AlsaOutput;
