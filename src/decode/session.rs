//! Codec session: owns at most one live decoder and tracks the output
//! format it reports across calls.

use crate::error::SessionError;
use crate::format::{BurstFrame, CodecId, FormatHints, PcmChunk};

use super::{BurstDecoder, DecoderFactory};

/// Result of decoding one burst frame.
pub struct Decoded {
    pub pcm: PcmChunk,
    pub channels: u32,
    pub sample_rate: u32,
    pub layout: u64,
    /// True when the decoder-reported triple differs from the previous
    /// call's. Sole authority for reconfiguring the normalizer and the
    /// output sink.
    pub format_changed: bool,
}

pub struct CodecSession<'a> {
    factory: &'a dyn DecoderFactory,
    active: Option<CodecId>,
    decoder: Option<Box<dyn BurstDecoder>>,
    channels: u32,
    sample_rate: u32,
    layout: u64,
}

impl<'a> CodecSession<'a> {
    pub fn new(factory: &'a dyn DecoderFactory) -> Self {
        Self {
            factory,
            active: None,
            decoder: None,
            channels: 0,
            sample_rate: 0,
            layout: 0,
        }
    }

    /// Make sure a decoder for `codec` is loaded, tearing down any decoder
    /// for a different codec first. A no-op when `codec` is already active.
    pub fn reconcile(&mut self, codec: CodecId, hints: &FormatHints) -> Result<(), SessionError> {
        if self.active == Some(codec) {
            return Ok(());
        }
        if self.decoder.is_some() {
            log::info!("codec changed from {:?} to {:?}", self.active, codec);
            self.decoder = None;
        }
        self.active = None;

        let decoder = self.factory.open(codec, hints)?;
        self.decoder = Some(decoder);
        self.active = Some(codec);
        log::info!("decoder loaded for {codec:?}");
        Ok(())
    }

    /// Feed the frame's unconsumed bytes to the active decoder and advance
    /// its read cursor by what the decoder reports having consumed.
    pub fn decode(&mut self, frame: &mut BurstFrame) -> Result<Decoded, SessionError> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| SessionError::Decode("no active decoder".into()))?;

        let out = decoder.decode(frame.remaining())?;
        frame.advance(out.consumed);

        let format_changed = out.channels != self.channels
            || out.sample_rate != self.sample_rate
            || out.layout != self.layout;
        if format_changed {
            self.channels = out.channels;
            self.sample_rate = out.sample_rate;
            self.layout = out.layout;
        }

        Ok(Decoded {
            pcm: out.pcm,
            channels: out.channels,
            sample_rate: out.sample_rate,
            layout: out.layout,
            format_changed,
        })
    }

    /// Tear the decoder down and forget the recorded format. Called on
    /// shutdown and when the stream reverts to raw PCM.
    pub fn reset(&mut self) {
        if self.decoder.is_some() {
            log::info!("decoder for {:?} closed", self.active);
        }
        self.decoder = None;
        self.active = None;
        self.channels = 0;
        self.sample_rate = 0;
        self.layout = 0;
    }
}
