//! # bounded_blocking_queue
//!
//! A bounded, thread-safe, blocking multiple-producer-multiple-consumer FIFO
//! queue built on a mutex and two condition variables.
//!
//! Inserting into a full queue blocks until a slot frees up, and removing from
//! (or peeking into) an empty queue blocks until a value arrives. Timed and
//! cancellable variants give up without changing the queue, and non-waiting
//! `try_*` variants report full or empty immediately.
//!
//! Every successful insert and removal is reported to an [`EventSink`]. The
//! default sink logs through `tracing` under the [`TRACING_TARGET`] target.

mod cancel;
mod common;
mod error;
mod event;
mod queue;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use error::{InsertError, QueueError};
pub use event::{EventSink, NoopSink, QueueEvent, TracingSink, TRACING_TARGET};
pub use queue::{BoundedBlockingQueue, Builder};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_is_shareable() {
        // Handles are shared between producer and consumer threads by reference
        fn is_send_sync<Q: Send + Sync>() -> bool { true }

        assert!(is_send_sync::<BoundedBlockingQueue<u32>>());
        assert!(is_send_sync::<BoundedBlockingQueue<String>>());
        assert!(is_send_sync::<CancelToken>());
        assert!(is_send_sync::<Builder<Vec<u8>>>());
    }
}
