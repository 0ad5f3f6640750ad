//! Format normalizer: converts decoder output of whatever sample
//! representation into the canonical interleaved signed 16-bit PCM the
//! playback device is opened with. Channel count and sample rate pass
//! through unchanged; only the sample representation is normalized.

use dasp_sample::Sample;

use crate::error::NormalizeError;
use crate::format::{PcmChunk, StreamFormat};

pub struct FormatNormalizer {
    format: Option<StreamFormat>,
    out: Vec<u8>,
}

impl FormatNormalizer {
    pub fn new() -> Self {
        Self { format: None, out: Vec::new() }
    }

    /// Adopt a new upstream format. Must be called exactly once per format
    /// change reported by the codec session; converting against a stale
    /// configuration produces silently wrong audio.
    pub fn reconfigure(&mut self, format: &StreamFormat) {
        log::info!(
            "normalizer configured for {} ch, {} Hz -> s16",
            format.channels,
            format.sample_rate
        );
        self.format = Some(format.clone());
        self.out.clear();
    }

    /// Convert one decoded chunk to interleaved little-endian s16 bytes.
    /// The returned slice is valid until the next call.
    pub fn convert(&mut self, pcm: &PcmChunk) -> Result<&[u8], NormalizeError> {
        if self.format.is_none() {
            return Err(NormalizeError::NotConfigured);
        }
        self.out.clear();
        match pcm {
            PcmChunk::S16(samples) => {
                for s in samples {
                    self.out.extend_from_slice(&s.to_le_bytes());
                }
            }
            PcmChunk::S32(samples) => {
                for s in samples {
                    self.out.extend_from_slice(&s.to_sample::<i16>().to_le_bytes());
                }
            }
            PcmChunk::F32(samples) => {
                for s in samples {
                    self.out.extend_from_slice(&s.to_sample::<i16>().to_le_bytes());
                }
            }
        }
        Ok(&self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_before_reconfigure_is_rejected() {
        let mut norm = FormatNormalizer::new();
        match norm.convert(&PcmChunk::S16(vec![0])) {
            Err(NormalizeError::NotConfigured) => {}
            other => panic!("expected NotConfigured, got {other:?}"),
        }
    }

    #[test]
    fn s16_passes_through_as_little_endian_bytes() {
        let mut norm = FormatNormalizer::new();
        norm.reconfigure(&StreamFormat::pcm_sentinel());
        let out = norm.convert(&PcmChunk::S16(vec![0x0102, -2])).unwrap();
        assert_eq!(out, &[0x02, 0x01, 0xfe, 0xff]);
    }

    #[test]
    fn f32_scales_to_s16() {
        let mut norm = FormatNormalizer::new();
        norm.reconfigure(&StreamFormat::pcm_sentinel());
        let out = norm.convert(&PcmChunk::F32(vec![0.0, 0.5, -0.5])).unwrap();
        let samples: Vec<i16> = out
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![0, 16384, -16384]);
    }

    #[test]
    fn s32_keeps_the_high_word() {
        let mut norm = FormatNormalizer::new();
        norm.reconfigure(&StreamFormat::pcm_sentinel());
        let out = norm.convert(&PcmChunk::S32(vec![0x1234_0000])).unwrap();
        assert_eq!(out, &[0x34, 0x12]);
    }
}
