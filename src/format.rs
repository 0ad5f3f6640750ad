//! Stream format descriptions shared across the relay pipeline.

/// How samples are represented on the playback side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Raw capture bytes relayed untouched (no decoder active).
    Passthrough,
    /// Decoded, normalized signed 16-bit linear PCM.
    PcmS16,
}

/// Everything needed to open (or reopen) the playback device.
///
/// Two formats compare equal iff every field matches; inequality is what
/// forces the output device to be closed and lazily reopened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFormat {
    pub channels: u32,
    pub sample_rate: u32,
    /// Speaker-position bitmask as reported by the decoder (0 = unknown).
    pub layout: u64,
    pub sample_format: SampleFormat,
}

impl StreamFormat {
    /// The "assume raw PCM until proven otherwise" format: the S/PDIF
    /// envelope is always 2-channel 16-bit at 48 kHz.
    pub fn pcm_sentinel() -> Self {
        Self {
            channels: 2,
            sample_rate: 48000,
            layout: 0x3, // front left | front right
            sample_format: SampleFormat::Passthrough,
        }
    }
}

/// Compressed codec family carried inside an IEC 61937 burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    Ac3,
    Mp1,
    Mp2,
    Mp3,
    Aac,
    Dts,
}

/// Format parameters recovered from the burst itself (currently only the
/// ADTS header of AAC bursts), passed to the decoder at open time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatHints {
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

/// Interleaved decoded samples in whatever representation the decoder
/// produced. Normalized to 16-bit PCM by the [`FormatNormalizer`].
///
/// [`FormatNormalizer`]: crate::normalize::FormatNormalizer
#[derive(Debug, Clone)]
pub enum PcmChunk {
    S16(Vec<i16>),
    S32(Vec<i32>),
    F32(Vec<f32>),
}

impl PcmChunk {
    pub fn is_empty(&self) -> bool {
        match self {
            PcmChunk::S16(s) => s.is_empty(),
            PcmChunk::S32(s) => s.is_empty(),
            PcmChunk::F32(s) => s.is_empty(),
        }
    }
}

/// One compressed payload extracted from an IEC 61937 burst, with the burst
/// framing already stripped and the payload words in native byte order.
///
/// The frame keeps a read cursor so a decoder that consumes fewer bytes than
/// the full payload leaves the leftover visible to the caller instead of
/// silently dropping it.
#[derive(Debug, Clone)]
pub struct BurstFrame {
    pub codec: CodecId,
    pub hints: FormatHints,
    data: Vec<u8>,
    pos: usize,
}

impl BurstFrame {
    pub fn new(codec: CodecId, hints: FormatHints, data: Vec<u8>) -> Self {
        Self { codec, hints, data, pos: 0 }
    }

    /// Total payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Payload bytes not yet consumed by a decoder.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Advance the read cursor by `n` consumed bytes (clamped to the end).
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.data.len());
    }
}
