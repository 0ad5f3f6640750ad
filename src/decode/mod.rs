//! Decoder seam and codec session lifecycle.
//!
//! Decoding itself is delegated to the decoding-library collaborator behind
//! the [`BurstDecoder`] trait; this module owns only the session around it.

mod session;
mod symphonia;

pub use self::session::{CodecSession, Decoded};
pub use self::symphonia::SymphoniaFactory;

use crate::error::SessionError;
use crate::format::{CodecId, FormatHints, PcmChunk};

/// One decoder call's worth of output.
pub struct DecodedFrame {
    /// Compressed bytes the decoder consumed from the input.
    pub consumed: usize,
    pub channels: u32,
    pub sample_rate: u32,
    pub layout: u64,
    /// Interleaved samples in the decoder's native representation.
    pub pcm: PcmChunk,
}

/// A decoder for one compressed codec family. Dropping the value releases
/// the underlying decoder instance.
pub trait BurstDecoder {
    fn decode(&mut self, data: &[u8]) -> Result<DecodedFrame, SessionError>;
}

/// Looks up and opens a decoder for a codec family.
pub trait DecoderFactory {
    fn open(
        &self,
        codec: CodecId,
        hints: &FormatHints,
    ) -> Result<Box<dyn BurstDecoder>, SessionError>;
}
