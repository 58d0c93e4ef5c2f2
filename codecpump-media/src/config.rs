//! Configuration types and defaults

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Drive loop tuning shared by every pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bound on every hardware queue wait, in microseconds
    pub dequeue_timeout_us: u64,
    /// Sleep when a tick moved no data, in microseconds
    pub idle_backoff_us: u64,
    /// Output events drained per tick at most
    pub max_outputs_per_tick: usize,
    /// Encoded chunks of this size or smaller are dropped as noise
    pub min_encoded_payload: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dequeue_timeout_us: 10_000,
            idle_backoff_us: 2_000,
            max_outputs_per_tick: 8,
            min_encoded_payload: 10,
        }
    }
}

impl PipelineConfig {
    /// Set the hardware queue timeout
    pub fn dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout_us = timeout.as_micros() as u64;
        self
    }

    /// Set the idle backoff
    pub fn idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff_us = backoff.as_micros() as u64;
        self
    }

    /// Hardware queue timeout as a duration
    pub fn dequeue_timeout_duration(&self) -> Duration {
        Duration::from_micros(self.dequeue_timeout_us)
    }

    /// Idle backoff as a duration
    pub fn idle_backoff_duration(&self) -> Duration {
        Duration::from_micros(self.idle_backoff_us)
    }
}

/// Audio capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Encoder bit rate in bits per second
    pub bit_rate: u32,
    /// Lower bound of the capture buffer, in bytes
    pub min_buffer_bytes: usize,
    /// Raise the capture thread's scheduling priority
    pub elevate_priority: bool,
    /// Sleep after a failed device read, in milliseconds
    pub read_error_backoff_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            bit_rate: 16_000,
            min_buffer_bytes: 2048,
            elevate_priority: true,
            read_error_backoff_ms: 5,
        }
    }
}

impl CaptureConfig {
    /// Set the encoder bit rate
    pub fn bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    /// Set the buffer lower bound
    pub fn min_buffer_bytes(mut self, bytes: usize) -> Self {
        self.min_buffer_bytes = bytes;
        self
    }

    /// Enable or disable priority elevation
    pub fn elevate_priority(mut self, elevate: bool) -> Self {
        self.elevate_priority = elevate;
        self
    }
}

/// Audio playback settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Base output buffer size in bytes
    pub base_buffer_bytes: usize,
    /// Whether output starts unmuted
    pub start_enabled: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_buffer_bytes: 4096,
            start_enabled: true,
        }
    }
}

impl PlaybackConfig {
    /// Preferred buffer size for a stream, before the device minimum is applied.
    ///
    /// 16 kHz stereo gets twice the base size.
    pub fn preferred_buffer_bytes(&self, sample_rate: u32, channel_count: u8) -> usize {
        if sample_rate == 16_000 && channel_count == 2 {
            self.base_buffer_bytes * 2
        } else {
            self.base_buffer_bytes
        }
    }

    /// Set the base buffer size
    pub fn base_buffer_bytes(mut self, bytes: usize) -> Self {
        self.base_buffer_bytes = bytes;
        self
    }

    /// Set the initial enabled state
    pub fn start_enabled(mut self, enabled: bool) -> Self {
        self.start_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.dequeue_timeout_duration(), Duration::from_millis(10));
        assert_eq!(config.idle_backoff_duration(), Duration::from_millis(2));
        assert_eq!(config.min_encoded_payload, 10);
    }

    #[test]
    fn test_playback_buffer_sizes() {
        let config = PlaybackConfig::default();
        assert_eq!(config.preferred_buffer_bytes(16_000, 1), 4096);
        assert_eq!(config.preferred_buffer_bytes(16_000, 2), 8192);
        assert_eq!(config.preferred_buffer_bytes(44_100, 2), 4096);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CaptureConfig = serde_json::from_str(r#"{"bit_rate": 32000}"#).unwrap();
        assert_eq!(config.bit_rate, 32_000);
        assert_eq!(config.min_buffer_bytes, 2048);
        assert!(config.elevate_priority);
    }
}
