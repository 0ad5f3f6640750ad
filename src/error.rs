//! Error taxonomy for the relay pipeline.
//!
//! Every runtime fault is caught at the relay-loop level and mapped to the
//! recovery policy; nothing here terminates the process except startup
//! configuration errors surfaced through `anyhow` in `main`.

use std::io;

use thiserror::Error;

use crate::format::CodecId;

/// Faults raised by the IEC 61937 frame synchronizer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The scratch window filled up without a burst preamble; the consumed
    /// bytes are raw PCM and stay available for passthrough playback.
    #[error("no burst preamble found within the scratch window")]
    SyncLost,

    /// The capture stream ended while searching or mid-burst.
    #[error("end of capture stream")]
    EndOfStream,

    /// The burst carries a data type the slot table does not know.
    #[error("unsupported IEC 61937 data type 0x{0:04x}")]
    UnsupportedDataType(u16),

    /// Malformed burst contents (e.g. a broken embedded ADTS header).
    #[error("malformed burst: {0}")]
    Protocol(String),

    /// A legitimate burst declared more payload than the scratch window can
    /// hold. A configuration fault: the scratch capacity is undersized.
    #[error("burst of {need} bytes exceeds the scratch capacity of {capacity}")]
    BurstTooLarge { need: usize, capacity: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Faults raised by the codec session around the decoding library.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No decoder is registered for the detected codec family.
    #[error("no decoder available for {0:?}")]
    CodecNotFound(CodecId),

    /// A decoder exists but could not be opened.
    #[error("cannot open decoder: {0}")]
    OpenFailed(String),

    /// The active decoder rejected a compressed frame.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Faults raised by the format normalizer.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// `convert` was called before any format was configured.
    #[error("normalizer used before a format was configured")]
    NotConfigured,
}

/// Faults raised by the capture device layer.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot open capture device: {0}")]
    Open(String),
}

/// Faults raised by the playback device layer.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot open playback device: {0}")]
    Open(String),

    #[error("playback failed: {0}")]
    Playback(String),
}

/// The fault that ended one relay session; maps to the recovery policy.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
