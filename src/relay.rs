//! Top-level relay loop.
//!
//! Pulls bytes through the frame synchronizer, routes compressed bursts to
//! the codec session and raw PCM straight through, keeps the playback sink
//! parameterized by the current stream format, and turns every runtime
//! fault into a teardown / fixed-backoff / restart cycle. The pipeline is a
//! single blocking thread; nothing here is shared or locked.

use std::io::Read;
use std::thread;

use crate::config::RelayConfig;
use crate::decode::{CodecSession, DecoderFactory};
use crate::error::{CaptureError, OutputError, RelayError, SyncError};
use crate::format::{SampleFormat, StreamFormat};
use crate::normalize::FormatNormalizer;
use crate::sync::FrameSync;

/// An open playback device accepting interleaved s16le bytes.
pub trait PlaybackSink {
    fn play(&mut self, bytes: &[u8]) -> Result<(), OutputError>;
}

/// Opens playback sinks parameterized by a stream format. Dropping the sink
/// closes the device.
pub trait OutputBackend {
    type Sink: PlaybackSink;
    fn open(&mut self, format: &StreamFormat) -> Result<Self::Sink, OutputError>;
}

/// Opens the capture device as a blocking byte source. `Ok(0)` from the
/// source is end-of-stream, distinct from an I/O error.
pub trait CaptureBackend {
    type Source: Read;
    fn open(&mut self) -> Result<Self::Source, CaptureError>;
}

pub struct RelayLoop<C, O, F> {
    capture: C,
    output: O,
    factory: F,
    config: RelayConfig,
}

impl<C, O, F> RelayLoop<C, O, F>
where
    C: CaptureBackend,
    O: OutputBackend,
    F: DecoderFactory,
{
    pub fn new(capture: C, output: O, factory: F, config: RelayConfig) -> Self {
        Self { capture, output, factory, config }
    }

    /// Run forever. Every session that dies to a runtime fault is torn down,
    /// logged, and restarted after the configured backoff; the relay never
    /// exits on a transient fault.
    pub fn run(&mut self) -> ! {
        loop {
            let fault = self.run_once();
            match &fault {
                RelayError::Sync(SyncError::BurstTooLarge { need, capacity }) => log::error!(
                    "scratch capacity of {capacity} bytes cannot hold a {need}-byte burst; \
                     raise --scratch-bytes"
                ),
                fault => log::warn!("relay fault: {fault}"),
            }
            log::info!("retrying in {:?}", self.config.retry_backoff);
            thread::sleep(self.config.retry_backoff);
        }
    }

    /// Drive one relay session until its first unrecoverable fault. All
    /// session state (synchronizer, codec session, normalizer, sink) lives
    /// on this frame so teardown on any exit path is guaranteed.
    fn run_once(&mut self) -> RelayError {
        let mut source = match self.capture.open() {
            Ok(source) => source,
            Err(e) => return e.into(),
        };

        let mut sync = FrameSync::new(self.config.scratch_bytes);
        let mut session = CodecSession::new(&self.factory);
        let mut normalizer = FormatNormalizer::new();
        let sentinel = StreamFormat::pcm_sentinel();
        let mut current = sentinel.clone();
        let mut sink: Option<O::Sink> = None;

        log::info!(
            "relay started: assuming raw PCM ({} ch, {} Hz) until a burst appears",
            current.channels,
            current.sample_rate
        );

        loop {
            let outcome = sync.read_burst(&mut source);

            // Bytes consumed during the preamble search are real PCM audio.
            // Play them before acting on the outcome, reverting to the
            // passthrough format if something was decoding until now.
            let garbage = sync.take_garbage();
            if !garbage.is_empty() {
                if current != sentinel {
                    log::info!("compressed stream ended, reverting to raw PCM passthrough");
                    sink = None;
                    current = sentinel.clone();
                    session.reset();
                }
                if let Err(e) = play(&mut self.output, &mut sink, &current, &garbage) {
                    return e.into();
                }
            }

            let mut frame = match outcome {
                Ok(frame) => frame,
                Err(SyncError::SyncLost) => continue,
                Err(SyncError::UnsupportedDataType(code)) => {
                    log::warn!("skipping burst with unsupported data type 0x{code:04x}");
                    continue;
                }
                Err(SyncError::Protocol(msg)) => {
                    log::warn!("skipping malformed burst: {msg}");
                    continue;
                }
                Err(e) => return e.into(),
            };

            if let Err(e) = session.reconcile(frame.codec, &frame.hints) {
                return e.into();
            }
            let decoded = match session.decode(&mut frame) {
                Ok(decoded) => decoded,
                Err(e) => return e.into(),
            };

            if decoded.format_changed {
                current = StreamFormat {
                    channels: decoded.channels,
                    sample_rate: decoded.sample_rate,
                    layout: decoded.layout,
                    sample_format: SampleFormat::PcmS16,
                };
                log::info!(
                    "stream format changed: {} ch, {} Hz, layout 0x{:x}",
                    current.channels,
                    current.sample_rate,
                    current.layout
                );
                sink = None;
                normalizer.reconfigure(&current);
            }

            if frame.remaining_len() > 0 {
                // Persistent leftovers across bursts indicate a stalled
                // decoder; worth seeing in the log but never dropped data.
                log::warn!(
                    "decoder left {} of {} burst bytes unconsumed",
                    frame.remaining_len(),
                    frame.len()
                );
            }

            if decoded.pcm.is_empty() {
                continue;
            }
            let pcm = match normalizer.convert(&decoded.pcm) {
                Ok(pcm) => pcm,
                Err(e) => return e.into(),
            };
            if let Err(e) = play(&mut self.output, &mut sink, &current, pcm) {
                return e.into();
            }
        }
    }
}

/// Lazily (re)open the sink for the current format, then play one chunk.
fn play<O: OutputBackend>(
    output: &mut O,
    sink: &mut Option<O::Sink>,
    format: &StreamFormat,
    bytes: &[u8],
) -> Result<(), OutputError> {
    let sink = match sink {
        Some(sink) => sink,
        None => sink.insert(output.open(format)?),
    };
    sink.play(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{BurstDecoder, DecodedFrame};
    use crate::error::SessionError;
    use crate::format::{CodecId, FormatHints, PcmChunk};
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    // -------- stub decoder factory --------

    #[derive(Default)]
    struct DecoderLog {
        opens: usize,
        drops: usize,
        payloads: Vec<Vec<u8>>,
    }

    struct StubDecoder {
        log: Rc<RefCell<DecoderLog>>,
        channels: u32,
        sample_rate: u32,
    }

    impl BurstDecoder for StubDecoder {
        fn decode(&mut self, data: &[u8]) -> Result<DecodedFrame, SessionError> {
            self.log.borrow_mut().payloads.push(data.to_vec());
            Ok(DecodedFrame {
                consumed: data.len(),
                channels: self.channels,
                sample_rate: self.sample_rate,
                layout: (1 << self.channels) - 1,
                pcm: PcmChunk::S16(vec![100i16; 64]),
            })
        }
    }

    impl Drop for StubDecoder {
        fn drop(&mut self) {
            self.log.borrow_mut().drops += 1;
        }
    }

    struct StubFactory {
        log: Rc<RefCell<DecoderLog>>,
    }

    impl StubFactory {
        fn new() -> Self {
            Self { log: Rc::new(RefCell::new(DecoderLog::default())) }
        }
    }

    impl DecoderFactory for StubFactory {
        fn open(
            &self,
            _codec: CodecId,
            _hints: &FormatHints,
        ) -> Result<Box<dyn BurstDecoder>, SessionError> {
            self.log.borrow_mut().opens += 1;
            Ok(Box::new(StubDecoder {
                log: self.log.clone(),
                channels: 6,
                sample_rate: 48000,
            }))
        }
    }

    // -------- mock devices --------

    struct MockCapture {
        data: Vec<u8>,
    }

    impl CaptureBackend for MockCapture {
        type Source = Cursor<Vec<u8>>;
        fn open(&mut self) -> Result<Self::Source, CaptureError> {
            Ok(Cursor::new(self.data.clone()))
        }
    }

    #[derive(Default)]
    struct OutputLog {
        opens: Vec<StreamFormat>,
        played: Vec<Vec<u8>>,
        fail_plays: usize,
    }

    struct MockOutput {
        log: Rc<RefCell<OutputLog>>,
    }

    struct MockSink {
        log: Rc<RefCell<OutputLog>>,
    }

    impl OutputBackend for MockOutput {
        type Sink = MockSink;
        fn open(&mut self, format: &StreamFormat) -> Result<MockSink, OutputError> {
            self.log.borrow_mut().opens.push(format.clone());
            Ok(MockSink { log: self.log.clone() })
        }
    }

    impl PlaybackSink for MockSink {
        fn play(&mut self, bytes: &[u8]) -> Result<(), OutputError> {
            let mut log = self.log.borrow_mut();
            if log.fail_plays > 0 {
                log.fail_plays -= 1;
                return Err(OutputError::Playback("device vanished".into()));
            }
            log.played.push(bytes.to_vec());
            Ok(())
        }
    }

    // -------- stream construction (mirrors the sync module's wire format) --------

    fn wire_burst(data_type: u16, payload: &[u8], slot_bytes: usize) -> Vec<u8> {
        let mut out = vec![0x72, 0xf8, 0x1f, 0x4e];
        out.extend_from_slice(&data_type.to_le_bytes());
        out.extend_from_slice(&((payload.len() * 8) as u16).to_le_bytes());
        let mut swapped = payload.to_vec();
        for pair in swapped.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
        out.extend_from_slice(&swapped);
        out.resize(out.len() + slot_bytes - payload.len() - 8, 0);
        out
    }

    fn relay(
        data: Vec<u8>,
        scratch: usize,
    ) -> (RelayLoop<MockCapture, MockOutput, StubFactory>, Rc<RefCell<OutputLog>>, Rc<RefCell<DecoderLog>>)
    {
        let out_log = Rc::new(RefCell::new(OutputLog::default()));
        let factory = StubFactory::new();
        let dec_log = factory.log.clone();
        let config = RelayConfig { scratch_bytes: scratch, ..RelayConfig::default() };
        let relay = RelayLoop::new(
            MockCapture { data },
            MockOutput { log: out_log.clone() },
            factory,
            config,
        );
        (relay, out_log, dec_log)
    }

    #[test]
    fn stub_decoder_receives_exactly_the_burst_payload() {
        let payload: Vec<u8> = (0..128u32).map(|i| (i * 3) as u8).collect();
        let (mut relay, _out, dec) = relay(wire_burst(0x0001, &payload, 6144), 1024);

        match relay.run_once() {
            RelayError::Sync(SyncError::EndOfStream) => {}
            other => panic!("expected EndOfStream, got {other:?}"),
        }
        assert_eq!(dec.borrow().payloads, vec![payload]);
    }

    #[test]
    fn pcm_to_codec_to_pcm_reopens_the_sink_exactly_once_per_transition() {
        // 64 bytes of silence, one AC-3 burst, 64 bytes of silence.
        let mut data = vec![0u8; 64];
        data.extend_from_slice(&wire_burst(0x0001, &[0x10u8; 256], 6144));
        data.extend_from_slice(&vec![0u8; 64]);
        let (mut relay, out, _dec) = relay(data, 1024);

        match relay.run_once() {
            RelayError::Sync(SyncError::EndOfStream) => {}
            other => panic!("expected EndOfStream, got {other:?}"),
        }

        let log = out.borrow();
        let sentinel = StreamFormat::pcm_sentinel();
        let formats: Vec<&StreamFormat> = log.opens.iter().collect();
        assert_eq!(formats.len(), 3, "one open per format transition");
        assert_eq!(*formats[0], sentinel);
        assert_eq!(formats[1].channels, 6);
        assert_eq!(formats[1].sample_format, SampleFormat::PcmS16);
        assert_eq!(*formats[2], sentinel);

        // The leading and trailing silence was played, not dropped.
        assert_eq!(log.played[0].len(), 64);
        assert_eq!(log.played.last().unwrap().len(), 64);
    }

    #[test]
    fn steady_decoding_does_not_churn_the_sink() {
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(&wire_burst(0x0001, &[0x10u8; 256], 6144));
        }
        let (mut relay, out, dec) = relay(data, 1024);

        relay.run_once();
        assert_eq!(out.borrow().opens.len(), 1, "same format, one open");
        assert_eq!(dec.borrow().opens, 1, "same codec, one decoder");
        assert_eq!(out.borrow().played.len(), 4);
    }

    #[test]
    fn oversized_burst_surfaces_as_a_capacity_fault() {
        let mut data = vec![0x72, 0xf8, 0x1f, 0x4e];
        data.extend_from_slice(&0x0001u16.to_le_bytes());
        data.extend_from_slice(&(2048u16 * 8).to_le_bytes());
        data.resize(data.len() + 2048, 0);
        let (mut relay, _out, _dec) = relay(data, 256);

        match relay.run_once() {
            RelayError::Sync(SyncError::BurstTooLarge { need: 2048, capacity: 256 }) => {}
            other => panic!("expected BurstTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn play_failure_tears_the_session_down_and_a_fresh_start_succeeds() {
        let data = wire_burst(0x0001, &[0x10u8; 256], 6144);
        let (mut relay, out, dec) = relay(data, 1024);
        out.borrow_mut().fail_plays = 1;

        match relay.run_once() {
            RelayError::Output(OutputError::Playback(_)) => {}
            other => panic!("expected Playback fault, got {other:?}"),
        }
        assert_eq!(dec.borrow().drops, 1, "decoder handle released on teardown");

        // The retry gets a fresh capture stream and a fresh decoder.
        match relay.run_once() {
            RelayError::Sync(SyncError::EndOfStream) => {}
            other => panic!("expected EndOfStream, got {other:?}"),
        }
        assert_eq!(dec.borrow().opens, 2);
        assert_eq!(out.borrow().played.len(), 1);
    }

    #[test]
    fn unsupported_data_type_is_skipped_not_fatal() {
        let mut data = wire_burst(0x00ff, &[0x10u8; 32], 6144);
        data.extend_from_slice(&wire_burst(0x0001, &[0x10u8; 256], 6144));
        let (mut relay, _out, dec) = relay(data, 16384);

        match relay.run_once() {
            RelayError::Sync(SyncError::EndOfStream) => {}
            other => panic!("expected EndOfStream, got {other:?}"),
        }
        assert_eq!(dec.borrow().opens, 1, "later well-formed burst still decodes");
    }
}
