//! # codecpump core
//!
//! Building blocks shared by every codec pipeline: the lifecycle state
//! machine and its observer interface, the single-slot pending-buffer
//! mailbox, the hardware endpoint contract, ADTS framing for AAC and
//! Annex-B helpers for H.264.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod adts;
pub mod endpoint;
pub mod error;
pub mod format;
pub mod h264;
pub mod mailbox;
pub mod state;

// Re-export main types
pub use adts::{AdtsHeader, ADTS_HEADER_LEN, SAMPLING_FREQUENCIES};
pub use endpoint::{
    BufferFlags, BufferInfo, CodecEndpoint, Direction, EndpointFactory, InputSlot,
    LoopbackEndpoint, LoopbackFactory, OutputEvent, RenderSurface,
};
pub use error::{CodecError, CodecResult, ErrorCategory};
pub use format::{CodecFormat, MediaFormat, MediaKind};
pub use h264::AnnexBFramer;
pub use mailbox::{Mailbox, PendingBuffer};
pub use state::{
    CodecState, ObserverSet, Operation, StateEvent, StateMachine, StateObserver, TracingObserver,
};
