//! IEC 61937 burst synchronizer.
//!
//! Scans an undifferentiated capture byte stream for the burst preamble,
//! extracts the compressed payload, classifies the codec family and skips
//! the zero padding so the next preamble lands at the expected offset.
//! Bytes consumed while hunting for a preamble are genuine raw PCM and are
//! kept in a bounded garbage window for the caller to play back.

use std::io::{ErrorKind, Read};

use crate::error::SyncError;
use crate::format::{BurstFrame, CodecId, FormatHints};

/// Burst preamble as it appears on the wire: sync words 0xF872 / 0x4E1F,
/// 16-bit little-endian.
const PREAMBLE: u32 = 0x72F8_1F4E;

/// Preamble plus the data-type and bit-length words.
const BURST_HEADER_SIZE: usize = 8;

/// Burst spacing in bytes for the MPEG audio families, indexed by
/// [MPEG-2 LSF, MPEG-1] x [layer 1, layer 2, layer 3].
const MPEG_SLOT_BYTES: [[usize; 3]; 2] = [
    [3072, 9216, 4608], // MPEG-2 LSF
    [1536, 4608, 4608], // MPEG-1
];

pub struct FrameSync {
    garbage: Vec<u8>,
    capacity: usize,
}

impl FrameSync {
    pub fn new(capacity: usize) -> Self {
        Self { garbage: Vec::with_capacity(capacity), capacity }
    }

    /// Raw PCM bytes consumed while searching for the last preamble. The
    /// caller must play these even when no burst was found; discarding them
    /// produces audible dropouts.
    pub fn take_garbage(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.garbage)
    }

    /// Read bytes until the next burst and extract its payload.
    ///
    /// On success the payload has been byte-swapped to native word order and
    /// the slot padding skipped. `SyncLost` means the scratch window filled
    /// with raw PCM instead; the bytes stay available via [`take_garbage`]
    /// in both cases.
    ///
    /// [`take_garbage`]: FrameSync::take_garbage
    pub fn read_burst<R: Read>(&mut self, src: &mut R) -> Result<BurstFrame, SyncError> {
        self.garbage.clear();

        let mut window: u32 = 0;
        loop {
            if self.garbage.len() >= self.capacity {
                return Err(SyncError::SyncLost);
            }
            let byte = read_u8(src)?;
            self.garbage.push(byte);
            window = (window << 8) | byte as u32;
            if window == PREAMBLE {
                break;
            }
        }
        // The four preamble bytes are protocol overhead, not audio.
        let keep = self.garbage.len() - 4;
        self.garbage.truncate(keep);

        let data_type = read_u16_le(src)?;
        let length_bits = read_u16_le(src)?;

        if length_bits % 16 != 0 {
            log::warn!(
                "burst of {} bits does not end on a 16-bit boundary, rounding up",
                length_bits
            );
        }
        let payload_len = (((length_bits as usize) + 15) & !15) / 8;
        if payload_len > self.capacity {
            return Err(SyncError::BurstTooLarge {
                need: payload_len,
                capacity: self.capacity,
            });
        }

        let mut payload = vec![0u8; payload_len];
        read_all(src, &mut payload)?;
        // Payload words are transmitted big-endian; swap to native order.
        for pair in payload.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }

        let (codec, slot_bytes, hints) = classify(data_type, &payload)?;

        // Skip the zero padding out to the burst slot so the next preamble
        // lands at the first byte of the next read.
        match slot_bytes.checked_sub(payload_len + BURST_HEADER_SIZE) {
            Some(padding) => skip(src, padding)?,
            None => log::warn!(
                "burst payload of {} bytes overruns its {}-byte slot",
                payload_len,
                slot_bytes
            ),
        }

        Ok(BurstFrame::new(codec, hints, payload))
    }
}

/// Map a burst data type to its codec family and total slot size. The slot
/// is fixed per family except for AAC, where it is derived from the ADTS
/// header embedded in the payload.
fn classify(data_type: u16, payload: &[u8]) -> Result<(CodecId, usize, FormatHints), SyncError> {
    let (codec, slot) = match data_type & 0xff {
        0x01 => (CodecId::Ac3, 6144),
        0x04 => (CodecId::Mp1, MPEG_SLOT_BYTES[1][0]),
        0x05 => (CodecId::Mp3, MPEG_SLOT_BYTES[1][0]),
        0x06 => (CodecId::Mp3, 4608),
        0x07 => {
            let adts = parse_adts(payload)?;
            let hints = FormatHints {
                sample_rate: Some(adts.sample_rate),
                channels: Some(adts.channels),
            };
            return Ok((CodecId::Aac, (adts.samples as usize) << 2, hints));
        }
        0x08 => (CodecId::Mp1, MPEG_SLOT_BYTES[0][0]),
        0x09 => (CodecId::Mp2, MPEG_SLOT_BYTES[0][1]),
        0x0a => (CodecId::Mp3, MPEG_SLOT_BYTES[0][2]),
        0x0b => (CodecId::Dts, 2048),
        0x0c => (CodecId::Dts, 4096),
        0x0d => (CodecId::Dts, 8192),
        _ => return Err(SyncError::UnsupportedDataType(data_type)),
    };
    Ok((codec, slot, FormatHints::default()))
}

/// Fields of an ADTS frame header needed for burst sizing and decoder setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtsHeader {
    pub sample_rate: u32,
    pub channels: u32,
    /// Whole frame length in bytes, header included.
    pub frame_len: usize,
    /// 7 without CRC, 9 with.
    pub header_len: usize,
    /// PCM samples per channel carried by the frame.
    pub samples: u32,
}

const ADTS_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Parse the fixed ADTS header at the start of `data`.
pub fn parse_adts(data: &[u8]) -> Result<AdtsHeader, SyncError> {
    if data.len() < 7 {
        return Err(SyncError::Protocol("truncated ADTS header".into()));
    }
    if data[0] != 0xff || data[1] & 0xf0 != 0xf0 {
        return Err(SyncError::Protocol("ADTS syncword not found".into()));
    }
    let layer = (data[1] >> 1) & 0x3;
    if layer != 0 {
        return Err(SyncError::Protocol(format!("invalid ADTS layer {layer}")));
    }
    let crc_absent = data[1] & 0x1;
    let freq_index = ((data[2] >> 2) & 0xf) as usize;
    if freq_index >= ADTS_SAMPLE_RATES.len() {
        return Err(SyncError::Protocol(format!(
            "invalid ADTS sampling frequency index {freq_index}"
        )));
    }
    let channels = (((data[2] & 0x1) << 2) | (data[3] >> 6)) as u32;
    let frame_len =
        ((data[3] & 0x3) as usize) << 11 | (data[4] as usize) << 3 | (data[5] >> 5) as usize;
    let raw_data_blocks = (data[6] & 0x3) as u32;

    Ok(AdtsHeader {
        sample_rate: ADTS_SAMPLE_RATES[freq_index],
        channels,
        frame_len,
        header_len: if crc_absent == 1 { 7 } else { 9 },
        samples: (raw_data_blocks + 1) * 1024,
    })
}

fn read_u8<R: Read>(src: &mut R) -> Result<u8, SyncError> {
    let mut byte = [0u8; 1];
    read_all(src, &mut byte)?;
    Ok(byte[0])
}

fn read_u16_le<R: Read>(src: &mut R) -> Result<u16, SyncError> {
    let mut word = [0u8; 2];
    read_all(src, &mut word)?;
    Ok(u16::from_le_bytes(word))
}

fn read_all<R: Read>(src: &mut R, buf: &mut [u8]) -> Result<(), SyncError> {
    src.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            SyncError::EndOfStream
        } else {
            SyncError::Io(e)
        }
    })
}

fn skip<R: Read>(src: &mut R, mut n: usize) -> Result<(), SyncError> {
    let mut scratch = [0u8; 512];
    while n > 0 {
        let want = n.min(scratch.len());
        read_all(src, &mut scratch[..want])?;
        n -= want;
    }
    Ok(())
}
