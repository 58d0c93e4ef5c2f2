//! Elementary-stream formats and endpoint format descriptions

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME type of AAC elementary streams
pub const MIME_AUDIO_AAC: &str = "audio/mp4a-latm";
/// MIME type of H.264 elementary streams
pub const MIME_VIDEO_AVC: &str = "video/avc";

/// Broad media category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// Audio stream
    Audio,
    /// Video stream
    Video,
}

/// Elementary-stream type handled by a pipeline. Chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecFormat {
    /// AAC Main profile
    AacMain,
    /// AAC Low Complexity profile
    AacLc,
    /// H.264 / AVC
    H264,
}

impl CodecFormat {
    /// Container MIME type
    pub fn mime_type(&self) -> &'static str {
        match self {
            CodecFormat::AacMain | CodecFormat::AacLc => MIME_AUDIO_AAC,
            CodecFormat::H264 => MIME_VIDEO_AVC,
        }
    }

    /// Audio or video
    pub fn kind(&self) -> MediaKind {
        match self {
            CodecFormat::AacMain | CodecFormat::AacLc => MediaKind::Audio,
            CodecFormat::H264 => MediaKind::Video,
        }
    }

    /// MPEG-4 audio object type, for AAC formats
    pub fn aac_profile(&self) -> Option<u8> {
        match self {
            CodecFormat::AacMain => Some(1),
            CodecFormat::AacLc => Some(2),
            CodecFormat::H264 => None,
        }
    }
}

impl fmt::Display for CodecFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CodecFormat::AacMain => "AAC-Main",
            CodecFormat::AacLc => "AAC-LC",
            CodecFormat::H264 => "H.264",
        };
        f.write_str(name)
    }
}

/// Format description handed to an endpoint at configure time, and reported
/// back by it on a format change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaFormat {
    /// Container MIME type
    pub mime: String,
    /// Audio sample rate in Hz
    pub sample_rate: Option<u32>,
    /// Audio channel count
    pub channel_count: Option<u8>,
    /// Video width in pixels
    pub width: Option<u32>,
    /// Video height in pixels
    pub height: Option<u32>,
    /// Target bit rate in bits per second
    pub bit_rate: Option<u32>,
    /// AAC audio object type
    pub aac_profile: Option<u8>,
    /// Largest input buffer the caller will submit
    pub max_input_size: Option<usize>,
    /// Codec-specific initialization data
    #[serde(skip)]
    pub csd0: Option<Bytes>,
}

impl MediaFormat {
    fn empty(mime: &str) -> Self {
        Self {
            mime: mime.to_string(),
            sample_rate: None,
            channel_count: None,
            width: None,
            height: None,
            bit_rate: None,
            aac_profile: None,
            max_input_size: None,
            csd0: None,
        }
    }

    /// Audio format with rate and channel count
    pub fn audio(mime: &str, sample_rate: u32, channel_count: u8) -> Self {
        Self {
            sample_rate: Some(sample_rate),
            channel_count: Some(channel_count),
            ..Self::empty(mime)
        }
    }

    /// Video format with frame size
    pub fn video(mime: &str, width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::empty(mime)
        }
    }

    /// Set the target bit rate
    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    /// Set the AAC audio object type
    pub fn with_aac_profile(mut self, profile: u8) -> Self {
        self.aac_profile = Some(profile);
        self
    }

    /// Attach codec-specific data
    pub fn with_csd0(mut self, csd0: impl Into<Bytes>) -> Self {
        self.csd0 = Some(csd0.into());
        self
    }

    /// Set the largest input buffer size
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = Some(size);
        self
    }

    /// Whether this is an audio format
    pub fn is_audio(&self) -> bool {
        self.mime.starts_with("audio/")
    }

    /// `(sample_rate, channel_count)` when both are known
    pub fn audio_params(&self) -> Option<(u32, u8)> {
        Some((self.sample_rate?, self.channel_count?))
    }
}
