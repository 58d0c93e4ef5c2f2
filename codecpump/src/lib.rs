//! # codecpump
//!
//! Drives hardware AAC and H.264 codecs through their asynchronous
//! dual-queue interface. Each pipeline owns one drive thread, accepts at
//! most one pending input buffer (newer input overwrites older) and walks
//! a small lifecycle state machine that rejects illegal calls instead of
//! panicking.
//!
//! ## Pieces
//!
//! - **Encoding**: [`AacEncoder`] wraps raw AAC output in ADTS headers;
//!   [`CaptureLoop`] feeds it from an audio-input device.
//! - **Decoding**: [`AudioDecoder`], [`VideoDecoder`], and
//!   [`PlaybackSink`] which plays decoded PCM through an output device.
//! - **Coordination**: [`StreamPlayer`] runs the video and speaker halves of
//!   one stream together and publishes [`PlayerEvent`]s.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codecpump::{LoopbackFactory, PumpConfig, StreamPlayer};
//! # use codecpump::AudioOutputFactory;
//! # use std::sync::Arc;
//!
//! # async fn example(outputs: Arc<dyn AudioOutputFactory>) -> codecpump::PumpResult<()> {
//! let player = StreamPlayer::new(PumpConfig::default(), Arc::new(LoopbackFactory::new()), outputs);
//! let mut events = player.events();
//!
//! player.prepare_speaker(16000, 1)?;
//! while let Some(event) = events.next().await {
//!     println!("Player event: {}", event.event_type());
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use codecpump_core::{
    adts, h264, AdtsHeader, AnnexBFramer, CodecEndpoint, CodecError, CodecFormat, CodecResult,
    CodecState, EndpointFactory, LoopbackEndpoint, LoopbackFactory, MediaFormat, MediaKind,
    ObserverSet, Operation, RenderSurface, StateEvent, StateObserver, TracingObserver,
    ADTS_HEADER_LEN,
};

pub use codecpump_media::{
    AacEncoder, AudioDecoder, AudioInputDevice, AudioInputFactory, AudioOutputDevice,
    AudioOutputFactory, CaptureConfig, CaptureLoop, DebugSink, DecodeListener, EncodeListener,
    MediaError, MediaResult, PipelineConfig, PlaybackConfig, PlaybackSink, RecordListener,
    RenderOptions, VideoDecoder, DEFAULT_HEIGHT, DEFAULT_WIDTH,
};

#[cfg(feature = "diagnostics")]
pub use codecpump_diagnostics::{DebugLogger, TransitionRecord, TransitionRecorder};

// Public API modules
pub mod config;
pub mod error;
pub mod event;
pub mod player;

// Re-export main API types
pub use config::PumpConfig;
pub use error::{PumpError, PumpResult};
pub use event::{BroadcastObserver, EventStream, PlayerEvent};
pub use player::StreamPlayer;
