//! Single-slot, newest-wins handoff between a producer and a drive loop
//!
//! A [`Mailbox`] behaves like a depth-1 channel that overwrites on full: a
//! submission replaces any value the consumer has not taken yet. Producers
//! never block on the consumer and get no backpressure signal; the number of
//! overwritten values is counted instead.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Latest-value cell, replaced on write, cleared on take
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    overwritten: AtomicU64,
}

impl<T> Mailbox<T> {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            overwritten: AtomicU64::new(0),
        }
    }

    /// Store `value`, dropping any unconsumed one.
    ///
    /// Returns `true` when an older value was overwritten.
    pub fn submit(&self, value: T) -> bool {
        let previous = self.slot.lock().replace(value);
        if previous.is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Read and clear the slot in one step
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Drop the pending value, if any
    pub fn clear(&self) {
        self.slot.lock().take();
    }

    /// Values replaced before the consumer took them
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One submitted input buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBuffer {
    data: Bytes,
    presentation_time_us: i64,
}

impl PendingBuffer {
    /// Wrap owned bytes
    pub fn new(data: impl Into<Bytes>, presentation_time_us: i64) -> Self {
        Self {
            data: data.into(),
            presentation_time_us,
        }
    }

    /// Copy the first `length` bytes of `content` (clamped to its size)
    pub fn copy_from(content: &[u8], length: usize, presentation_time_us: i64) -> Self {
        let length = length.min(content.len());
        Self::new(Bytes::copy_from_slice(&content[..length]), presentation_time_us)
    }

    /// Buffer contents
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Byte length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Presentation timestamp in microseconds
    pub fn presentation_time_us(&self) -> i64 {
        self.presentation_time_us
    }
}
