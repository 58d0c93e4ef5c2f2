//! Codec lifecycle state machine
//!
//! Every encoder and decoder owns exactly one [`StateMachine`]. It gates the
//! hardware endpoint's `start`/`stop`/`release` calls so they only happen in a
//! state where they are legal, collapses endpoint failures to a well-defined
//! state, and reports every transition, rejection and failure to a
//! [`StateObserver`].
//!
//! ```text
//! Uninitialized -> Preparing -> Prepared -> Stop -> Release
//!                      |
//!                      +-> Failed
//! ```

use crate::endpoint::CodecEndpoint;
use crate::error::{CodecError, CodecResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle state of a codec pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecState {
    /// Not configured, or recovered from an endpoint failure
    Uninitialized,
    /// Format built, endpoint being opened
    Preparing,
    /// Endpoint running, drive loop active
    Prepared,
    /// Endpoint stopped, can be restarted or released
    Stop,
    /// Endpoint freed, instance no longer usable
    Release,
    /// Configuration failed, instance must be recreated
    Failed,
}

impl CodecState {
    /// Whether the state diagram contains an edge from `self` to `to`
    pub fn can_transition_to(self, to: CodecState) -> bool {
        use CodecState::*;
        match (self, to) {
            (Release, Preparing) => true,
            (_, Preparing) => self != Preparing,
            (Preparing, Prepared) => true,
            (Preparing, Failed) => true,
            (Prepared, Stop) => true,
            (Stop, Release) => true,
            (Prepared | Stop | Release, Uninitialized) => true,
            _ => false,
        }
    }

    /// Whether the drive loop should be pumping
    pub fn is_active(self) -> bool {
        self == CodecState::Prepared
    }
}

impl fmt::Display for CodecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CodecState::Uninitialized => "uninitialized",
            CodecState::Preparing => "preparing",
            CodecState::Prepared => "prepared",
            CodecState::Stop => "stop",
            CodecState::Release => "release",
            CodecState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Lifecycle operation that caused an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Public prepare
    Prepare,
    /// Endpoint activation
    Start,
    /// Endpoint deactivation
    Stop,
    /// Endpoint teardown
    Release,
    /// Internal re-prepare after release (retarget or format change)
    Rebuild,
    /// Render target swap
    SwitchSurface,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Prepare => "prepare",
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Release => "release",
            Operation::Rebuild => "rebuild",
            Operation::SwitchSurface => "switch surface",
        };
        f.write_str(name)
    }
}

/// Observable lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// State changed
    Transition {
        /// Pipeline label
        codec: &'static str,
        /// Previous state
        from: CodecState,
        /// New state
        to: CodecState,
        /// Operation in progress
        operation: Operation,
    },
    /// Operation called in a state where it is illegal; state unchanged
    Rejected {
        /// Pipeline label
        codec: &'static str,
        /// Rejected operation
        operation: Operation,
        /// State at the time of the call
        state: CodecState,
    },
    /// Endpoint or configuration failure
    Failed {
        /// Pipeline label
        codec: &'static str,
        /// Operation in progress
        operation: Operation,
        /// Error description
        reason: String,
    },
}

impl StateEvent {
    /// Label of the pipeline that emitted the event
    pub fn codec(&self) -> &'static str {
        match self {
            StateEvent::Transition { codec, .. }
            | StateEvent::Rejected { codec, .. }
            | StateEvent::Failed { codec, .. } => codec,
        }
    }

    /// Get event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            StateEvent::Transition { .. } => "transition",
            StateEvent::Rejected { .. } => "rejected",
            StateEvent::Failed { .. } => "failed",
        }
    }
}

/// Receives every lifecycle event of the pipelines it is attached to
pub trait StateObserver: Send + Sync {
    /// Called synchronously on the thread performing the operation
    fn on_event(&self, event: &StateEvent);
}

impl<F> StateObserver for F
where
    F: Fn(&StateEvent) + Send + Sync,
{
    fn on_event(&self, event: &StateEvent) {
        self(event)
    }
}

/// Default observer, writes events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StateObserver for TracingObserver {
    fn on_event(&self, event: &StateEvent) {
        match event {
            StateEvent::Transition {
                codec,
                from,
                to,
                operation,
            } => info!(codec, %from, %to, %operation, "Codec state transition"),
            StateEvent::Rejected {
                codec,
                operation,
                state,
            } => warn!(codec, %operation, %state, "Illegal codec operation ignored"),
            StateEvent::Failed {
                codec,
                operation,
                reason,
            } => warn!(codec, %operation, reason = %reason, "Codec operation failed"),
        }
    }
}

/// Fan-out to several observers
#[derive(Default)]
pub struct ObserverSet {
    observers: RwLock<Vec<Arc<dyn StateObserver>>>,
}

impl ObserverSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set that already logs through [`TracingObserver`]
    pub fn with_tracing() -> Self {
        let set = Self::new();
        set.add(Arc::new(TracingObserver));
        set
    }

    /// Attach another observer
    pub fn add(&self, observer: Arc<dyn StateObserver>) {
        self.observers.write().push(observer);
    }

    /// Number of attached observers
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Whether no observer is attached
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}

impl StateObserver for ObserverSet {
    fn on_event(&self, event: &StateEvent) {
        for observer in self.observers.read().iter() {
            observer.on_event(event);
        }
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.len())
            .finish()
    }
}

/// Guarded lifecycle of one codec instance
pub struct StateMachine {
    codec: &'static str,
    state: CodecState,
    observer: Arc<dyn StateObserver>,
}

impl StateMachine {
    /// Create a machine in `Uninitialized`
    pub fn new(codec: &'static str, observer: Arc<dyn StateObserver>) -> Self {
        Self {
            codec,
            state: CodecState::Uninitialized,
            observer,
        }
    }

    /// Pipeline label used in events
    pub fn codec(&self) -> &'static str {
        self.codec
    }

    /// Current state
    pub fn state(&self) -> CodecState {
        self.state
    }

    /// Enter `Preparing` for a fresh configuration.
    ///
    /// Legal from every state except `Release`: a released instance is not
    /// reusable.
    pub fn begin_prepare(&mut self) -> CodecResult<()> {
        match self.state {
            CodecState::Release => Err(self.reject(Operation::Prepare)),
            CodecState::Preparing => Ok(()),
            _ => {
                self.transition(CodecState::Preparing, Operation::Prepare);
                Ok(())
            }
        }
    }

    /// Re-enter `Preparing` after an internal `Stop -> Release` teardown
    pub fn begin_rebuild(&mut self) -> CodecResult<()> {
        if self.state != CodecState::Release {
            return Err(self.reject(Operation::Rebuild));
        }
        self.transition(CodecState::Preparing, Operation::Rebuild);
        Ok(())
    }

    /// Record a configuration failure; `Preparing` becomes `Failed`
    pub fn fail(&mut self, operation: Operation, error: &CodecError) {
        self.emit(StateEvent::Failed {
            codec: self.codec,
            operation,
            reason: error.to_string(),
        });
        if self.state == CodecState::Preparing {
            self.transition(CodecState::Failed, operation);
        }
    }

    /// Activate the endpoint. Legal from `Preparing` or `Stop`.
    ///
    /// A restart from `Stop` passes through `Preparing`, so the machine never
    /// moves `Stop -> Prepared` in one step.
    pub fn start(&mut self, endpoint: Option<&mut Box<dyn CodecEndpoint>>) -> CodecResult<()> {
        match self.state {
            CodecState::Preparing => {}
            CodecState::Stop => self.transition(CodecState::Preparing, Operation::Start),
            _ => return Err(self.reject(Operation::Start)),
        }
        self.transition(CodecState::Prepared, Operation::Start);
        let result = match endpoint {
            Some(endpoint) => endpoint.start(),
            None => Err(CodecError::NoInstance),
        };
        self.settle(Operation::Start, result)
    }

    /// Deactivate the endpoint. Legal only from `Prepared`.
    pub fn stop(&mut self, endpoint: Option<&mut Box<dyn CodecEndpoint>>) -> CodecResult<()> {
        if self.state != CodecState::Prepared {
            return Err(self.reject(Operation::Stop));
        }
        self.transition(CodecState::Stop, Operation::Stop);
        let result = match endpoint {
            Some(endpoint) => endpoint.stop(),
            None => Err(CodecError::NoInstance),
        };
        self.settle(Operation::Stop, result)
    }

    /// Free the endpoint. Legal only from `Stop`.
    pub fn release(&mut self, endpoint: Option<&mut Box<dyn CodecEndpoint>>) -> CodecResult<()> {
        if self.state != CodecState::Stop {
            return Err(self.reject(Operation::Release));
        }
        self.transition(CodecState::Release, Operation::Release);
        let result = match endpoint {
            Some(endpoint) => endpoint.release(),
            None => Err(CodecError::NoInstance),
        };
        self.settle(Operation::Release, result)
    }

    /// Report an illegal call and build the matching error. State is unchanged.
    pub fn reject(&self, operation: Operation) -> CodecError {
        self.emit(StateEvent::Rejected {
            codec: self.codec,
            operation,
            state: self.state,
        });
        CodecError::IllegalState {
            operation,
            state: self.state,
        }
    }

    /// Forward an arbitrary event to the observer
    pub fn emit(&self, event: StateEvent) {
        self.observer.on_event(&event);
    }

    fn settle(&mut self, operation: Operation, result: CodecResult<()>) -> CodecResult<()> {
        if let Err(error) = &result {
            self.emit(StateEvent::Failed {
                codec: self.codec,
                operation,
                reason: error.to_string(),
            });
            self.transition(CodecState::Uninitialized, operation);
        }
        result
    }

    fn transition(&mut self, to: CodecState, operation: Operation) {
        let from = self.state;
        debug_assert!(from.can_transition_to(to), "{from} -> {to}");
        self.state = to;
        self.emit(StateEvent::Transition {
            codec: self.codec,
            from,
            to,
            operation,
        });
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("codec", &self.codec)
            .field("state", &self.state)
            .finish()
    }
}
