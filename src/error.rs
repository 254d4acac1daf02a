//! Error types returned by the blocking queue

use std::fmt;

use thiserror::Error;

/// Reasons a queue operation did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was constructed with a capacity of zero
    #[error("queue capacity must be at least 1, got {capacity}")]
    InvalidCapacity {
        /// The rejected capacity
        capacity: usize,
    },

    /// A waiting operation was aborted through its [`CancelToken`](crate::CancelToken)
    #[error("wait was cancelled before the queue became ready")]
    Cancelled,

    /// A waiting operation reached its deadline before the queue became ready
    #[error("wait timed out before the queue became ready")]
    TimedOut,
}

/// Error returned by an insert that gave up waiting for a free slot.
///
/// The queue is left exactly as it was, and the value is handed back so the
/// caller can retry.
pub struct InsertError<T> {
    kind: QueueError,
    value: T,
}

impl<T> InsertError<T> {
    pub(crate) fn new(kind: QueueError, value: T) -> Self {
        Self { kind, value }
    }

    /// Why the insert gave up
    pub fn kind(&self) -> QueueError {
        self.kind
    }

    /// Recovers the value that was not inserted
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> fmt::Debug for InsertError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for InsertError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "insert failed: {}", self.kind)
    }
}

impl<T> std::error::Error for InsertError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl<T> From<InsertError<T>> for QueueError {
    fn from(err: InsertError<T>) -> Self {
        err.kind
    }
}
