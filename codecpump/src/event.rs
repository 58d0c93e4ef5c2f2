//! Player events and the stream that delivers them

use codecpump_core::{CodecState, Operation, StateEvent, StateObserver};
use tokio::sync::broadcast;
use tracing::debug;

/// Events published by a [`StreamPlayer`](crate::StreamPlayer)
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A pipeline changed state
    StateChanged {
        /// Pipeline label
        codec: &'static str,
        /// Previous state
        from: CodecState,
        /// New state
        to: CodecState,
        /// Operation in progress
        operation: Operation,
    },
    /// A lifecycle call was illegal in the pipeline's state
    OperationRejected {
        /// Pipeline label
        codec: &'static str,
        /// Rejected operation
        operation: Operation,
        /// State at the time of the call
        state: CodecState,
    },
    /// A pipeline failed to configure or lost its endpoint
    PipelineFailed {
        /// Pipeline label
        codec: &'static str,
        /// Operation in progress
        operation: Operation,
        /// Error description
        reason: String,
    },
    /// Video output moved to another render target
    TargetSwitched {
        /// Identifier of the new target
        surface_id: u64,
    },
    /// Speaker was muted or unmuted
    SpeakerToggled {
        /// Whether output is now audible
        enabled: bool,
    },
    /// Playback was stopped
    Stopped,
}

impl PlayerEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::StateChanged { .. } => "state_changed",
            PlayerEvent::OperationRejected { .. } => "operation_rejected",
            PlayerEvent::PipelineFailed { .. } => "pipeline_failed",
            PlayerEvent::TargetSwitched { .. } => "target_switched",
            PlayerEvent::SpeakerToggled { .. } => "speaker_toggled",
            PlayerEvent::Stopped => "stopped",
        }
    }

    /// Check if this event came from a pipeline's state machine
    pub fn is_lifecycle_event(&self) -> bool {
        matches!(
            self,
            PlayerEvent::StateChanged { .. }
                | PlayerEvent::OperationRejected { .. }
                | PlayerEvent::PipelineFailed { .. }
        )
    }

    /// Check if this is an error event
    pub fn is_error_event(&self) -> bool {
        matches!(
            self,
            PlayerEvent::OperationRejected { .. } | PlayerEvent::PipelineFailed { .. }
        )
    }
}

impl From<&StateEvent> for PlayerEvent {
    fn from(event: &StateEvent) -> Self {
        match event {
            StateEvent::Transition {
                codec,
                from,
                to,
                operation,
            } => PlayerEvent::StateChanged {
                codec,
                from: *from,
                to: *to,
                operation: *operation,
            },
            StateEvent::Rejected {
                codec,
                operation,
                state,
            } => PlayerEvent::OperationRejected {
                codec,
                operation: *operation,
                state: *state,
            },
            StateEvent::Failed {
                codec,
                operation,
                reason,
            } => PlayerEvent::PipelineFailed {
                codec,
                operation: *operation,
                reason: reason.clone(),
            },
        }
    }
}

/// Republishes pipeline state events on a broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    sender: broadcast::Sender<PlayerEvent>,
}

impl BroadcastObserver {
    /// Publish through `sender`
    pub fn new(sender: broadcast::Sender<PlayerEvent>) -> Self {
        Self { sender }
    }
}

impl StateObserver for BroadcastObserver {
    fn on_event(&self, event: &StateEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(PlayerEvent::from(event));
    }
}

/// Stream of player events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<PlayerEvent>,
    closed: bool,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: broadcast::Receiver<PlayerEvent>) -> Self {
        Self {
            receiver,
            closed: false,
        }
    }

    /// Get the next event from the stream.
    ///
    /// Events dropped because this stream fell behind are skipped. Returns
    /// `None` once the player is gone or the stream was closed.
    pub async fn next(&mut self) -> Option<PlayerEvent> {
        while !self.closed {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => self.closed = true,
            }
        }
        None
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<PlayerEvent>, broadcast::error::TryRecvError> {
        if self.closed {
            return Err(broadcast::error::TryRecvError::Closed);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Ok(Some(event)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event stream lagged");
                }
                Err(error) => {
                    self.closed = true;
                    return Err(error);
                }
            }
        }
    }

    /// Close the event stream
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Check if the event stream is closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
