//! Lifecycle event recording
//!
//! [`TransitionRecorder`] is a [`StateObserver`] that keeps a bounded,
//! timestamped history of every state event it sees. Attach it next to the
//! tracing observer with an `ObserverSet` and inspect or export it later.

use crate::error::DiagnosticsResult;
use chrono::{DateTime, Utc};
use codecpump_core::{CodecState, StateEvent, StateObserver};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Events kept when no capacity is given
pub const DEFAULT_CAPACITY: usize = 1024;

/// One recorded event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionRecord {
    /// Time the event was observed
    pub timestamp: DateTime<Utc>,
    /// The event
    #[serde(flatten)]
    pub event: StateEvent,
}

/// Per-codec event counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodecSummary {
    /// State changes
    pub transitions: usize,
    /// Illegal calls
    pub rejections: usize,
    /// Endpoint or configuration failures
    pub failures: usize,
    /// State after the most recent transition
    pub last_state: Option<CodecState>,
}

/// Bounded history of state events
#[derive(Debug)]
pub struct TransitionRecorder {
    records: Mutex<VecDeque<TransitionRecord>>,
    capacity: usize,
}

impl TransitionRecorder {
    /// Create a recorder keeping [`DEFAULT_CAPACITY`] events
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a recorder keeping the most recent `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    /// All retained records, oldest first
    pub fn records(&self) -> Vec<TransitionRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop all records
    pub fn clear(&self) {
        self.records.lock().clear();
    }

    /// Records emitted by pipeline `codec`
    pub fn for_codec(&self, codec: &str) -> Vec<TransitionRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.event.codec() == codec)
            .cloned()
            .collect()
    }

    /// `(from, to)` pairs of pipeline `codec`, oldest first
    pub fn transitions(&self, codec: &str) -> Vec<(CodecState, CodecState)> {
        self.records
            .lock()
            .iter()
            .filter_map(|record| match &record.event {
                StateEvent::Transition {
                    codec: label,
                    from,
                    to,
                    ..
                } if *label == codec => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    /// Event counts per pipeline label
    pub fn summary(&self) -> BTreeMap<&'static str, CodecSummary> {
        let mut summary: BTreeMap<&'static str, CodecSummary> = BTreeMap::new();
        for record in self.records.lock().iter() {
            let entry = summary.entry(record.event.codec()).or_default();
            match &record.event {
                StateEvent::Transition { to, .. } => {
                    entry.transitions += 1;
                    entry.last_state = Some(*to);
                }
                StateEvent::Rejected { .. } => entry.rejections += 1,
                StateEvent::Failed { .. } => entry.failures += 1,
            }
        }
        summary
    }

    /// Export retained records as a JSON array
    pub fn to_json(&self) -> DiagnosticsResult<String> {
        let records = self.records();
        Ok(serde_json::to_string_pretty(&records)?)
    }
}

impl Default for TransitionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl StateObserver for TransitionRecorder {
    fn on_event(&self, event: &StateEvent) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(TransitionRecord {
            timestamp: Utc::now(),
            event: event.clone(),
        });
    }
}
