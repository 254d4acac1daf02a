//! Observability hook for queue operations
//!
//! The queue reports every successful insert and removal to an [`EventSink`].
//! Sinks are called after the queue lock has been released, from whichever
//! thread performed the operation, so they must be cheap and must serialize
//! their own output.

use std::fmt;

/// Target used by [`TracingSink`] for emitted events
pub const TRACING_TARGET: &str = "bounded_blocking_queue";

/// An operation that changed the queue contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    /// An item was appended to the back of the queue
    Inserted {
        /// Queue length right after the insert
        size: usize,
        /// Queue capacity
        capacity: usize,
    },
    /// An item was taken from the front of the queue
    Removed {
        /// Queue length right after the removal
        size: usize,
        /// Queue capacity
        capacity: usize,
    },
}

impl QueueEvent {
    /// Queue length observed under the lock when the event happened
    pub fn size(&self) -> usize {
        match *self {
            QueueEvent::Inserted { size, .. } | QueueEvent::Removed { size, .. } => size,
        }
    }

    /// Capacity of the queue that produced the event
    pub fn capacity(&self) -> usize {
        match *self {
            QueueEvent::Inserted { capacity, .. } | QueueEvent::Removed { capacity, .. } => capacity,
        }
    }
}

impl fmt::Display for QueueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueEvent::Inserted { .. } => f.write_str("item added to the queue"),
            QueueEvent::Removed { .. } => f.write_str("item removed from the queue"),
        }
    }
}

/// Receiver of queue events.
///
/// Implementations must not block for more than a negligible time and must
/// never call back into the queue that reported the event.
pub trait EventSink: Send + Sync {
    /// Records a single event
    fn record(&self, event: &QueueEvent);
}

impl<F> EventSink for F
where
    F: Fn(&QueueEvent) + Send + Sync,
{
    #[inline]
    fn record(&self, event: &QueueEvent) {
        self(event)
    }
}

/// Forwards events to `tracing` at DEBUG level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &QueueEvent) {
        tracing::debug!(
            target: TRACING_TARGET,
            size = event.size(),
            capacity = event.capacity(),
            "{}",
            event
        );
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    #[inline]
    fn record(&self, _event: &QueueEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn event_messages() {
        let added = QueueEvent::Inserted { size: 1, capacity: 4 };
        let removed = QueueEvent::Removed { size: 0, capacity: 4 };

        assert_eq!(added.to_string(), "item added to the queue");
        assert_eq!(removed.to_string(), "item removed from the queue");
        assert_eq!(added.size(), 1);
        assert_eq!(removed.capacity(), 4);
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &QueueEvent| seen.lock().unwrap().push(*event);

        sink.record(&QueueEvent::Inserted { size: 1, capacity: 2 });
        sink.record(&QueueEvent::Removed { size: 0, capacity: 2 });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], QueueEvent::Removed { size: 0, capacity: 2 });
    }

    #[test]
    fn builtin_sinks_accept_events() {
        let event = QueueEvent::Inserted { size: 3, capacity: 3 };
        TracingSink.record(&event);
        NoopSink.record(&event);
    }
}
