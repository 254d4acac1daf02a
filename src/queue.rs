//! Bounded blocking FIFO queue
//!
//! [`BoundedBlockingQueue`] is shared by reference between any number of
//! producer and consumer threads. Producers block while the queue is full,
//! consumers block while it is empty. Values come out in the order they went
//! in, and the number of queued values never exceeds the capacity.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crate::cancel::{CancelToken, Interrupt};
use crate::common::{Condition, Items, QueueCore, WaitLimit};
use crate::error::{InsertError, QueueError};
use crate::event::{EventSink, QueueEvent, TracingSink};

/// A fixed-capacity, thread-safe FIFO queue with blocking insert and removal
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use bounded_blocking_queue::BoundedBlockingQueue;
///
/// let queue = Arc::new(BoundedBlockingQueue::<i32>::new(2).unwrap());
///
/// let producer = {
///     let queue = Arc::clone(&queue);
///     thread::spawn(move || {
///         for i in 0..10 {
///             queue.insert(i);
///         }
///     })
/// };
///
/// for i in 0..10 {
///     assert_eq!(queue.remove_front(), i);
/// }
/// producer.join().unwrap();
/// ```
pub struct BoundedBlockingQueue<T> {
    /// Items and synchronization state
    core: Arc<QueueCore<T>>,

    /// Receives an event for every successful insert and removal
    sink: Arc<dyn EventSink>,
}

/// Configures and validates a [`BoundedBlockingQueue`]
pub struct Builder<T> {
    capacity: usize,
    sink: Arc<dyn EventSink>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Builder<T> {
    /// Starts a builder for a queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sink: Arc::new(TracingSink),
            _marker: PhantomData,
        }
    }

    /// Replaces the default [`TracingSink`]
    pub fn event_sink<S: EventSink + 'static>(self, sink: S) -> Self {
        self.shared_event_sink(Arc::new(sink))
    }

    /// Uses a sink that is shared with other queues or with the caller
    pub fn shared_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Builds the queue, failing with [`QueueError::InvalidCapacity`] when the
    /// capacity is zero
    pub fn build(self) -> Result<BoundedBlockingQueue<T>, QueueError> {
        if self.capacity < 1 {
            return Err(QueueError::InvalidCapacity { capacity: self.capacity });
        }

        tracing::debug!(target: crate::TRACING_TARGET, capacity = self.capacity, "queue created");

        Ok(BoundedBlockingQueue {
            core: Arc::new(QueueCore::new(self.capacity)),
            sink: self.sink,
        })
    }
}

impl<T> fmt::Debug for Builder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<T> BoundedBlockingQueue<T> {
    /// Creates an empty queue that reports events through `tracing`
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        Builder::new(capacity).build()
    }

    /// Starts configuring a queue with the given capacity
    pub fn builder(capacity: usize) -> Builder<T> {
        Builder::new(capacity)
    }

    /// Maximum number of items the queue holds
    #[inline]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Number of queued items.
    ///
    /// The answer may be stale as soon as it is returned. It must not be used
    /// to predict whether a following insert or removal will block.
    pub fn size(&self) -> usize {
        self.core.was_size()
    }

    /// Whether the queue was empty during this call
    pub fn was_empty(&self) -> bool {
        self.core.was_empty()
    }

    /// Whether the queue was full during this call
    pub fn was_full(&self) -> bool {
        self.core.was_full()
    }

    /// Appends `value` to the back, blocking while the queue is full
    pub fn insert(&self, value: T) {
        let items = self.core.wait(Condition::NotFull);
        self.push_locked(items, value);
    }

    /// Removes and returns the front value, blocking while the queue is empty
    pub fn remove_front(&self) -> T {
        let items = self.core.wait(Condition::NotEmpty);
        self.pop_locked(items)
    }

    /// Appends `value` if a slot is free, otherwise hands it back
    pub fn try_insert(&self, value: T) -> Result<(), T> {
        let items = self.core.lock();
        if items.len() >= self.capacity() {
            return Err(value);
        }
        self.push_locked(items, value);
        Ok(())
    }

    /// Removes the front value if there is one
    pub fn try_remove_front(&self) -> Option<T> {
        let items = self.core.lock();
        if items.is_empty() {
            return None;
        }
        Some(self.pop_locked(items))
    }

    /// Like [`insert`](Self::insert), giving up after `timeout`
    pub fn insert_timeout(&self, value: T, timeout: Duration) -> Result<(), InsertError<T>> {
        self.insert_limited(value, deadline_after(timeout), None)
    }

    /// Like [`remove_front`](Self::remove_front), giving up after `timeout`
    pub fn remove_front_timeout(&self, timeout: Duration) -> Result<T, QueueError> {
        self.remove_front_limited(deadline_after(timeout), None)
    }

    fn insert_limited(
        &self,
        value: T,
        deadline: Option<Instant>,
        token: Option<&CancelToken>,
    ) -> Result<(), InsertError<T>> {
        match self.core.wait_limited(Condition::NotFull, WaitLimit { deadline, token }) {
            Ok(items) => {
                self.push_locked(items, value);
                Ok(())
            }
            Err(kind) => Err(InsertError::new(kind, value)),
        }
    }

    fn remove_front_limited(
        &self,
        deadline: Option<Instant>,
        token: Option<&CancelToken>,
    ) -> Result<T, QueueError> {
        let items = self.core.wait_limited(Condition::NotEmpty, WaitLimit { deadline, token })?;
        Ok(self.pop_locked(items))
    }

    /// Appends under the lock, then releases it before signalling and
    /// reporting
    fn push_locked(&self, mut items: Items<'_, T>, value: T) {
        debug_assert!(items.len() < self.capacity());
        items.push_back(value);
        let size = items.len();
        drop(items);

        self.core.notify(Condition::NotEmpty);
        self.sink.record(&QueueEvent::Inserted { size, capacity: self.capacity() });
    }

    fn pop_locked(&self, mut items: Items<'_, T>) -> T {
        let Some(value) = items.pop_front() else {
            unreachable!("removal proceeded on an empty queue");
        };
        let size = items.len();
        drop(items);

        self.core.notify(Condition::NotFull);
        self.sink.record(&QueueEvent::Removed { size, capacity: self.capacity() });
        value
    }
}

impl<T: Clone> BoundedBlockingQueue<T> {
    /// Returns a clone of the front value without removing it, blocking while
    /// the queue is empty.
    ///
    /// The queue lock is released before this returns. If `T` is a handle
    /// whose resolution may itself block, that blocking happens after the
    /// queue call has finished and never while the queue is locked.
    pub fn peek_front(&self) -> T {
        let items = self.core.wait(Condition::NotEmpty);
        self.peek_locked(items)
    }

    /// Returns a clone of the front value if there is one
    pub fn try_peek_front(&self) -> Option<T> {
        self.core.lock().front().cloned()
    }

    /// Like [`peek_front`](Self::peek_front), giving up after `timeout`
    pub fn peek_front_timeout(&self, timeout: Duration) -> Result<T, QueueError> {
        let limit = WaitLimit { deadline: deadline_after(timeout), token: None };
        let items = self.core.wait_limited(Condition::NotEmpty, limit)?;
        Ok(self.peek_locked(items))
    }

    fn peek_locked(&self, items: Items<'_, T>) -> T {
        let Some(value) = items.front().cloned() else {
            unreachable!("peek proceeded on an empty queue");
        };
        drop(items);

        // A peek leaves the queue non-empty. Pass on the wake-up it may have
        // taken from a consumer that is still waiting.
        self.core.notify(Condition::NotEmpty);
        value
    }
}

impl<T: Send + 'static> BoundedBlockingQueue<T> {
    /// Like [`insert`](Self::insert), giving up once `token` is cancelled.
    ///
    /// A cancelled insert leaves the queue unchanged and returns the value.
    pub fn insert_cancellable(&self, value: T, token: &CancelToken) -> Result<(), InsertError<T>> {
        let _registration = token.register(self.waiter());
        self.insert_limited(value, None, Some(token))
    }

    /// Like [`remove_front`](Self::remove_front), giving up once `token` is
    /// cancelled
    pub fn remove_front_cancellable(&self, token: &CancelToken) -> Result<T, QueueError> {
        let _registration = token.register(self.waiter());
        self.remove_front_limited(None, Some(token))
    }

    fn waiter(&self) -> Weak<dyn Interrupt> {
        let core: Arc<dyn Interrupt> = self.core.clone();
        Arc::downgrade(&core)
    }
}

impl<T: Clone + Send + 'static> BoundedBlockingQueue<T> {
    /// Like [`peek_front`](Self::peek_front), giving up once `token` is
    /// cancelled
    pub fn peek_front_cancellable(&self, token: &CancelToken) -> Result<T, QueueError> {
        let _registration = token.register(self.waiter());
        let limit = WaitLimit { deadline: None, token: Some(token) };
        let items = self.core.wait_limited(Condition::NotEmpty, limit)?;
        Ok(self.peek_locked(items))
    }
}

impl<T> fmt::Debug for BoundedBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBlockingQueue")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

/// `None` means the timeout is too large to represent and the wait is unbounded
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    fn recording_queue<T>(capacity: usize) -> (BoundedBlockingQueue<T>, Arc<Mutex<Vec<QueueEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let events = Arc::clone(&events);
            move |event: &QueueEvent| events.lock().unwrap().push(*event)
        };
        let queue = BoundedBlockingQueue::builder(capacity).event_sink(sink).build().unwrap();
        (queue, events)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = BoundedBlockingQueue::<u32>::new(0).unwrap_err();
        assert_eq!(err, QueueError::InvalidCapacity { capacity: 0 });
        assert!(BoundedBlockingQueue::<u32>::builder(0).event_sink(crate::event::NoopSink).build().is_err());
    }

    #[test]
    fn test_basic_fifo() {
        let q = BoundedBlockingQueue::new(16).unwrap();

        q.insert(1);
        q.insert(2);
        q.insert(3);
        assert_eq!(q.size(), 3);

        assert_eq!(q.peek_front(), 1);
        assert_eq!(q.remove_front(), 1);
        assert_eq!(q.remove_front(), 2);
        assert_eq!(q.remove_front(), 3);
        assert!(q.was_empty());
    }

    #[test]
    fn test_try_operations_respect_capacity() {
        let q = BoundedBlockingQueue::new(2).unwrap();

        assert_eq!(q.try_insert('a'), Ok(()));
        assert_eq!(q.try_insert('b'), Ok(()));
        assert!(q.was_full());
        assert_eq!(q.try_insert('c'), Err('c'));

        assert_eq!(q.try_peek_front(), Some('a'));
        assert_eq!(q.try_remove_front(), Some('a'));
        assert_eq!(q.try_insert('c'), Ok(()));

        assert_eq!(q.try_remove_front(), Some('b'));
        assert_eq!(q.try_remove_front(), Some('c'));
        assert_eq!(q.try_remove_front(), None);
        assert_eq!(q.try_peek_front(), None);
    }

    #[test]
    fn test_events_reported_for_mutations_only() {
        let (q, events) = recording_queue(2);

        q.insert(10);
        q.insert(20);
        assert_eq!(q.peek_front(), 10);
        assert_eq!(q.try_insert(30), Err(30));
        assert_eq!(q.remove_front(), 10);

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                QueueEvent::Inserted { size: 1, capacity: 2 },
                QueueEvent::Inserted { size: 2, capacity: 2 },
                QueueEvent::Removed { size: 1, capacity: 2 },
            ]
        );
    }

    #[test]
    fn test_timeouts_leave_queue_unchanged() {
        let (q, events) = recording_queue::<u32>(1);

        let err = q.remove_front_timeout(Duration::from_millis(20)).unwrap_err();
        assert_eq!(err, QueueError::TimedOut);
        assert_eq!(q.peek_front_timeout(Duration::ZERO), Err(QueueError::TimedOut));

        q.insert(5);
        let err = q.insert_timeout(6, Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.kind(), QueueError::TimedOut);
        assert_eq!(err.into_inner(), 6);

        assert_eq!(q.size(), 1);
        assert_eq!(q.remove_front_timeout(Duration::from_secs(1)), Ok(5));
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_huge_timeout_waits_like_blocking_call() {
        let q = Arc::new(BoundedBlockingQueue::<u64>::new(1).unwrap());

        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.remove_front_timeout(Duration::MAX))
        };

        thread::sleep(Duration::from_millis(20));
        q.insert(99);
        assert_eq!(consumer.join().unwrap(), Ok(99));
    }

    #[test]
    fn test_cancel_blocked_insert() {
        let q = Arc::new(BoundedBlockingQueue::<String>::new(1).unwrap());
        q.insert(String::from("first"));
        let token = CancelToken::new();

        let producer = {
            let q = Arc::clone(&q);
            let token = token.clone();
            thread::spawn(move || q.insert_cancellable(String::from("second"), &token))
        };

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        let err = producer.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), QueueError::Cancelled);
        assert_eq!(err.into_inner(), "second");
        assert_eq!(q.size(), 1);
        assert_eq!(q.remove_front(), "first");
    }

    #[test]
    fn test_cancel_blocked_consumers() {
        let q = Arc::new(BoundedBlockingQueue::<u32>::new(4).unwrap());
        let token = CancelToken::new();

        let remover = {
            let q = Arc::clone(&q);
            let token = token.clone();
            thread::spawn(move || q.remove_front_cancellable(&token))
        };
        let peeker = {
            let q = Arc::clone(&q);
            let token = token.clone();
            thread::spawn(move || q.peek_front_cancellable(&token))
        };

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        assert_eq!(remover.join().unwrap(), Err(QueueError::Cancelled));
        assert_eq!(peeker.join().unwrap(), Err(QueueError::Cancelled));
        assert!(q.was_empty());
    }

    #[test]
    fn test_cancellable_calls_succeed_when_ready() {
        let q = BoundedBlockingQueue::new(1).unwrap();
        let token = CancelToken::new();

        assert!(q.insert_cancellable(1u8, &token).is_ok());
        token.cancel();

        // Readiness is checked before the token
        assert_eq!(q.peek_front_cancellable(&token), Ok(1));
        assert_eq!(q.remove_front_cancellable(&token), Ok(1));
        assert_eq!(q.remove_front_cancellable(&token), Err(QueueError::Cancelled));
    }

    #[test]
    fn test_cancel_does_not_disturb_other_waiters() {
        let q = Arc::new(BoundedBlockingQueue::<u32>::new(1).unwrap());
        let token = CancelToken::new();

        let cancelled = {
            let q = Arc::clone(&q);
            let token = token.clone();
            thread::spawn(move || q.remove_front_cancellable(&token))
        };
        let plain = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.remove_front())
        };

        thread::sleep(Duration::from_millis(50));
        token.cancel();
        assert_eq!(cancelled.join().unwrap(), Err(QueueError::Cancelled));

        q.insert(42);
        assert_eq!(plain.join().unwrap(), 42);
    }

    #[test]
    fn test_debug_output() {
        let q = BoundedBlockingQueue::new(3).unwrap();
        q.insert(1u16);
        assert_eq!(format!("{:?}", q), "BoundedBlockingQueue { capacity: 3, size: 1, .. }");
    }
}
