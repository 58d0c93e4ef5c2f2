//! Configuration types and defaults

use crate::error::PumpResult;
use codecpump_core::CodecFormat;
use codecpump_media::{CaptureConfig, PipelineConfig, PlaybackConfig};
use serde::{Deserialize, Serialize};

/// Aggregated configuration for a [`StreamPlayer`](crate::StreamPlayer)
/// and the capture loops built next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Video stream type
    pub video_format: CodecFormat,
    /// Audio stream type
    pub audio_format: CodecFormat,
    /// Drive loop tuning
    pub pipeline: PipelineConfig,
    /// Audio capture settings
    pub capture: CaptureConfig,
    /// Audio playback settings
    pub playback: PlaybackConfig,
    /// Events buffered per subscriber before the slowest one lags
    pub event_capacity: usize,
    /// Install the default log subscriber on construction
    pub debug_logging: bool,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            video_format: CodecFormat::H264,
            audio_format: CodecFormat::AacLc,
            pipeline: PipelineConfig::default(),
            capture: CaptureConfig::default(),
            playback: PlaybackConfig::default(),
            event_capacity: 256,
            debug_logging: false,
        }
    }
}

impl PumpConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> PumpResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> PumpResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Set the stream types
    pub fn formats(mut self, video: CodecFormat, audio: CodecFormat) -> Self {
        self.video_format = video;
        self.audio_format = audio;
        self
    }

    /// Set the drive loop tuning
    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Set the playback settings
    pub fn playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    /// Enable or disable log subscriber installation
    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PumpConfig::default();
        assert_eq!(config.video_format, CodecFormat::H264);
        assert_eq!(config.audio_format, CodecFormat::AacLc);
        assert_eq!(config.event_capacity, 256);
        assert!(config.playback.start_enabled);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PumpConfig::from_json_str(
            r#"{ "audio_format": "AacMain", "playback": { "start_enabled": false } }"#,
        )
        .unwrap();
        assert_eq!(config.audio_format, CodecFormat::AacMain);
        assert_eq!(config.video_format, CodecFormat::H264);
        assert!(!config.playback.start_enabled);
        assert_eq!(config.playback.base_buffer_bytes, 4096);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_json_round_trip() {
        let config = PumpConfig::default().debug_logging(true);
        let parsed = PumpConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(PumpConfig::from_json_str("{ \"event_capacity\": \"many\" }").is_err());
    }
}
