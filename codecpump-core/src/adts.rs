//! ADTS framing for AAC access units
//!
//! Every AAC access unit leaving the encoder is prefixed with a fixed 7-byte
//! ADTS header (MPEG-2 ID, layer 0, no CRC, variable-rate buffer fullness,
//! one raw data block). Consumers demux the stream by reading a header, then
//! `frame_length - 7` payload bytes.

use crate::error::{CodecError, CodecResult};
use serde::Serialize;

/// Header size without CRC
pub const ADTS_HEADER_LEN: usize = 7;

/// Largest value of the 13-bit frame length field
pub const MAX_FRAME_LEN: usize = 0x1FFF;

/// Sampling frequencies indexed by `sampling_frequency_index`
pub const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

const BUFFER_FULLNESS_VBR: u16 = 0x7FF;

/// Look up the frequency index of a sample rate
pub fn frequency_index(sample_rate: u32) -> CodecResult<u8> {
    SAMPLING_FREQUENCIES
        .iter()
        .position(|&rate| rate == sample_rate)
        .map(|index| index as u8)
        .ok_or_else(|| CodecError::unsupported(format!("sample rate {sample_rate} Hz")))
}

/// Sample rate for a frequency index
pub fn sample_rate_for_index(index: u8) -> Option<u32> {
    SAMPLING_FREQUENCIES.get(index as usize).copied()
}

/// Map a channel count to the 3-bit channel configuration.
///
/// The field has no room for a literal 8, so 8 channels (7.1) are signalled
/// as configuration 7 and a count of 7 has no encoding and is rejected.
pub fn channel_configuration(channel_count: u8) -> CodecResult<u8> {
    match channel_count {
        1..=6 => Ok(channel_count),
        8 => Ok(7),
        _ => Err(CodecError::unsupported(format!(
            "{channel_count} channels"
        ))),
    }
}

fn channel_count_for_configuration(configuration: u8) -> CodecResult<u8> {
    match configuration {
        1..=6 => Ok(configuration),
        7 => Ok(8),
        _ => Err(CodecError::unsupported(
            "channel configuration carried in program config element",
        )),
    }
}

/// The four variable fields of an ADTS header.
///
/// Only [`AdtsHeader::new`], [`AdtsHeader::for_payload`] and
/// [`AdtsHeader::parse`] build one, so every header holds in-range fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdtsHeader {
    profile: u8,
    sampling_frequency_index: u8,
    channel_count: u8,
    frame_length: u16,
}

impl AdtsHeader {
    /// Validate and build a header
    pub fn new(
        profile: u8,
        sampling_frequency_index: u8,
        channel_count: u8,
        frame_length: usize,
    ) -> CodecResult<Self> {
        if !(1..=4).contains(&profile) {
            return Err(CodecError::unsupported(format!("AAC profile {profile}")));
        }
        if sample_rate_for_index(sampling_frequency_index).is_none() {
            return Err(CodecError::unsupported(format!(
                "sampling frequency index {sampling_frequency_index}"
            )));
        }
        channel_configuration(channel_count)?;
        if !(ADTS_HEADER_LEN..=MAX_FRAME_LEN).contains(&frame_length) {
            return Err(CodecError::InvalidHeader {
                reason: format!("frame length {frame_length} outside 7..=8191"),
            });
        }
        Ok(Self {
            profile,
            sampling_frequency_index,
            channel_count,
            frame_length: frame_length as u16,
        })
    }

    /// Header for a payload of `payload_len` bytes
    pub fn for_payload(
        profile: u8,
        sampling_frequency_index: u8,
        channel_count: u8,
        payload_len: usize,
    ) -> CodecResult<Self> {
        Self::new(
            profile,
            sampling_frequency_index,
            channel_count,
            payload_len + ADTS_HEADER_LEN,
        )
    }

    /// MPEG-4 audio object type, 1..=4 (2 = AAC-LC)
    pub fn profile(&self) -> u8 {
        self.profile
    }

    /// Index into [`SAMPLING_FREQUENCIES`]
    pub fn sampling_frequency_index(&self) -> u8 {
        self.sampling_frequency_index
    }

    /// Channel count, 1..=6 or 8
    pub fn channel_count(&self) -> u8 {
        self.channel_count
    }

    /// Total frame length including this header
    pub fn frame_length(&self) -> usize {
        self.frame_length as usize
    }

    /// Payload bytes following the header
    pub fn payload_length(&self) -> usize {
        self.frame_length as usize - ADTS_HEADER_LEN
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        SAMPLING_FREQUENCIES[self.sampling_frequency_index as usize]
    }

    /// Serialize to the 7-byte wire layout
    pub fn to_bytes(&self) -> [u8; ADTS_HEADER_LEN] {
        // Validated at construction
        let configuration = if self.channel_count == 8 {
            7
        } else {
            self.channel_count
        };
        let length = self.frame_length;
        [
            0xFF,
            // sync low nibble, ID = 1 (MPEG-2), layer 00, protection absent
            0xF9,
            ((self.profile - 1) << 6) | (self.sampling_frequency_index << 2) | (configuration >> 2),
            ((configuration & 0x03) << 6) | ((length >> 11) as u8 & 0x03),
            ((length >> 3) & 0xFF) as u8,
            (((length & 0x07) as u8) << 5) | ((BUFFER_FULLNESS_VBR >> 6) as u8 & 0x1F),
            (((BUFFER_FULLNESS_VBR & 0x3F) as u8) << 2),
        ]
    }

    /// Parse and validate a header from the start of `bytes`
    pub fn parse(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() < ADTS_HEADER_LEN {
            return Err(CodecError::InvalidHeader {
                reason: format!("need {ADTS_HEADER_LEN} bytes, got {}", bytes.len()),
            });
        }
        if bytes[0] != 0xFF || bytes[1] & 0xF0 != 0xF0 {
            return Err(CodecError::InvalidHeader {
                reason: "missing sync word".to_string(),
            });
        }
        if bytes[1] & 0x06 != 0 {
            return Err(CodecError::InvalidHeader {
                reason: "layer must be 0".to_string(),
            });
        }
        if bytes[1] & 0x01 == 0 {
            return Err(CodecError::InvalidHeader {
                reason: "CRC-protected frames are not supported".to_string(),
            });
        }

        let profile = (bytes[2] >> 6) + 1;
        let sampling_frequency_index = (bytes[2] >> 2) & 0x0F;
        let configuration = ((bytes[2] & 0x01) << 2) | (bytes[3] >> 6);
        let frame_length = (((bytes[3] & 0x03) as usize) << 11)
            | ((bytes[4] as usize) << 3)
            | ((bytes[5] >> 5) as usize);

        Self::new(
            profile,
            sampling_frequency_index,
            channel_count_for_configuration(configuration)?,
            frame_length,
        )
    }
}

/// Build a header from its four fields
pub fn build_header(
    profile: u8,
    sampling_frequency_index: u8,
    channel_count: u8,
    frame_length: usize,
) -> CodecResult<[u8; ADTS_HEADER_LEN]> {
    AdtsHeader::new(profile, sampling_frequency_index, channel_count, frame_length)
        .map(|header| header.to_bytes())
}

/// Two-byte AudioSpecificConfig used as AAC decoder CSD-0
pub fn audio_specific_config(profile: u8, sample_rate: u32, channel_count: u8) -> CodecResult<[u8; 2]> {
    if !(1..=4).contains(&profile) {
        return Err(CodecError::unsupported(format!("AAC profile {profile}")));
    }
    let index = frequency_index(sample_rate)?;
    let configuration = channel_configuration(channel_count)?;
    let config = ((profile as u16) << 11) | ((index as u16) << 7) | ((configuration as u16) << 3);
    Ok(config.to_be_bytes())
}

/// Iterate over the frames of a concatenated ADTS stream
pub fn frames(data: &[u8]) -> AdtsFrames<'_> {
    AdtsFrames { data }
}

/// Iterator returned by [`frames`]
#[derive(Debug, Clone)]
pub struct AdtsFrames<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for AdtsFrames<'a> {
    type Item = CodecResult<(AdtsHeader, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }
        let header = match AdtsHeader::parse(self.data) {
            Ok(header) => header,
            Err(e) => {
                self.data = &[];
                return Some(Err(e));
            }
        };
        let length = header.frame_length as usize;
        if self.data.len() < length {
            let available = self.data.len();
            self.data = &[];
            return Some(Err(CodecError::InvalidData {
                reason: format!("truncated frame: need {length} bytes, have {available}"),
            }));
        }
        let payload = &self.data[ADTS_HEADER_LEN..length];
        self.data = &self.data[length..];
        Some(Ok((header, payload)))
    }
}
