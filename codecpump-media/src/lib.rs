//! # codecpump media
//!
//! Codec pipelines and the audio devices around them. Every encoder and
//! decoder shares one drive loop ([`pipeline::Pipeline`]) parameterized by
//! a codec kind; the capture loop feeds the AAC encoder from an audio-input
//! device and the playback sink plays decoded AAC through an audio-output
//! device.

#![warn(clippy::all)]

pub mod capture;
pub mod config;
pub mod decoder;
pub mod device;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod priority;
pub mod render;

// Re-export main types
pub use capture::{CaptureLoop, CaptureStats, DebugSink, RecordListener};
pub use config::{CaptureConfig, PipelineConfig, PlaybackConfig};
pub use decoder::{AudioDecoder, AudioParams, DecodeEvent, DecodeListener, VideoDecoder};
pub use device::{
    open_with_fallback, AudioInputDevice, AudioInputFactory, AudioOutputDevice,
    AudioOutputFactory,
};
pub use encoder::{AacEncoder, EncodeEvent, EncodeListener};
pub use error::{ErrorCategory, MediaError, MediaResult};
pub use pipeline::{CodecKind, Pipeline};
pub use playback::PlaybackSink;
pub use render::{RenderOptions, DEFAULT_HEIGHT, DEFAULT_WIDTH};
