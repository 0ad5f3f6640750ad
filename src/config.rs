//! Relay configuration, assembled once at startup and passed explicitly
//! into the relay loop.

use std::time::Duration;

/// The largest fixed burst slot in the IEC 61937 family table (MPEG-2 LSF
/// layer 2). The sync scratch window must hold at least one such burst.
pub const MIN_SCRATCH_BYTES: usize = 9216;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// ALSA capture device carrying the S/PDIF signal (e.g. "hw:1,0")
    pub capture_device: String,
    /// ALSA playback device name
    pub playback_device: String,
    /// Scratch capacity in bytes for burst synchronization; bytes consumed
    /// while hunting for a preamble are relayed as raw PCM in chunks of at
    /// most this size.
    pub scratch_bytes: usize,
    /// Fixed delay before reopening devices after a runtime fault
    pub retry_backoff: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            capture_device: "default".to_string(),
            playback_device: "default".to_string(),
            scratch_bytes: 32768,
            retry_backoff: Duration::from_secs(1),
        }
    }
}
