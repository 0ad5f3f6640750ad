//! Decoder factory backed by Symphonia's codec registry.
//!
//! Covers the MPEG audio and AAC burst families. AC-3 and DTS have no
//! registry decoder; they surface as `CodecNotFound` and take the same
//! recovery path a missing codec of any kind does.

use symphonia::core::audio::{Channels, SampleBuffer};
use symphonia::core::codecs::{
    CODEC_TYPE_AAC, CODEC_TYPE_MP1, CODEC_TYPE_MP2, CODEC_TYPE_MP3, CodecParameters, Decoder,
    DecoderOptions,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;

use crate::error::SessionError;
use crate::format::{CodecId, FormatHints, PcmChunk};
use crate::sync::parse_adts;

use super::{BurstDecoder, DecodedFrame, DecoderFactory};

pub struct SymphoniaFactory;

impl DecoderFactory for SymphoniaFactory {
    fn open(
        &self,
        codec: CodecId,
        hints: &FormatHints,
    ) -> Result<Box<dyn BurstDecoder>, SessionError> {
        let codec_type = match codec {
            CodecId::Mp1 => CODEC_TYPE_MP1,
            CodecId::Mp2 => CODEC_TYPE_MP2,
            CodecId::Mp3 => CODEC_TYPE_MP3,
            CodecId::Aac => CODEC_TYPE_AAC,
            CodecId::Ac3 | CodecId::Dts => return Err(SessionError::CodecNotFound(codec)),
        };

        let mut params = CodecParameters::new();
        params.for_codec(codec_type);
        if let Some(rate) = hints.sample_rate {
            params.with_sample_rate(rate);
        }
        if let Some(count) = hints.channels.filter(|&c| c > 0) {
            if let Some(channels) = Channels::from_bits((1u32 << count) - 1) {
                params.with_channels(channels);
            }
        }

        let inner = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(_) => SessionError::CodecNotFound(codec),
                e => SessionError::OpenFailed(e.to_string()),
            })?;

        Ok(Box::new(SymphoniaDecoder { inner, codec }))
    }
}

struct SymphoniaDecoder {
    inner: Box<dyn Decoder>,
    codec: CodecId,
}

impl BurstDecoder for SymphoniaDecoder {
    fn decode(&mut self, data: &[u8]) -> Result<DecodedFrame, SessionError> {
        // AAC bursts carry ADTS frames; the registry decoder wants the raw
        // AAC access unit with the header stripped.
        let (feed, consumed) = if self.codec == CodecId::Aac {
            let adts = parse_adts(data).map_err(|e| SessionError::Decode(e.to_string()))?;
            let end = adts.frame_len.min(data.len());
            (&data[adts.header_len.min(end)..end], end)
        } else {
            (data, data.len())
        };

        let packet = Packet::new_from_slice(0, 0, 0, feed);
        let decoded = self
            .inner
            .decode(&packet)
            .map_err(|e| SessionError::Decode(e.to_string()))?;

        let spec = *decoded.spec();
        let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);

        Ok(DecodedFrame {
            consumed,
            channels: spec.channels.count() as u32,
            sample_rate: spec.rate,
            layout: spec.channels.bits() as u64,
            pcm: PcmChunk::F32(samples.samples().to_vec()),
        })
    }
}
