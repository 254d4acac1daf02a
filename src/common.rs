//! Lock-guarded state shared by every handle to a queue
//!
//! This module owns the synchronization protocol: a single mutex guarding the
//! items, and two condition variables for the "not full" and "not empty"
//! conditions. Every wait re-tests its predicate after waking, so spurious
//! wakeups and competing waiters never let an operation proceed on a full or
//! empty queue.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::cancel::{CancelToken, Interrupt};
use crate::error::QueueError;

/// Locked view of the queued items
pub(crate) type Items<'a, T> = MutexGuard<'a, VecDeque<T>>;

/// The two conditions a caller can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Condition {
    /// `len < capacity`, awaited by producers
    NotFull,
    /// `len > 0`, awaited by consumers
    NotEmpty,
}

/// Upper bounds on how long a wait may last
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WaitLimit<'a> {
    pub deadline: Option<Instant>,
    pub token: Option<&'a CancelToken>,
}

/// Shared queue state
pub(crate) struct QueueCore<T> {
    items: Mutex<VecDeque<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> QueueCore<T> {
    /// Creates empty state for a queue holding at most `capacity` items.
    ///
    /// `capacity` has already been validated by the caller.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity >= 1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Acquires the queue lock.
    ///
    /// No user code runs while the lock is held, so a poisoned lock still
    /// guards a consistent deque and is recovered instead of propagated.
    #[inline]
    pub fn lock(&self) -> Items<'_, T> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of items at the time of the call; may be stale on return
    pub fn was_size(&self) -> usize {
        self.lock().len()
    }

    pub fn was_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn was_full(&self) -> bool {
        self.lock().len() >= self.capacity
    }

    #[inline]
    fn holds(&self, condition: Condition, items: &VecDeque<T>) -> bool {
        match condition {
            Condition::NotFull => items.len() < self.capacity,
            Condition::NotEmpty => !items.is_empty(),
        }
    }

    #[inline]
    fn condvar(&self, condition: Condition) -> &Condvar {
        match condition {
            Condition::NotFull => &self.not_full,
            Condition::NotEmpty => &self.not_empty,
        }
    }

    /// Signals one thread waiting for `condition`
    #[inline]
    pub fn notify(&self, condition: Condition) {
        self.condvar(condition).notify_one();
    }

    /// Blocks until `condition` holds and returns the lock guard proving it
    pub fn wait(&self, condition: Condition) -> Items<'_, T> {
        let items = self.lock();
        self.condvar(condition)
            .wait_while(items, |items| !self.holds(condition, items))
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until `condition` holds, the deadline passes or the token is
    /// cancelled, whichever comes first.
    ///
    /// The predicate is tested before the limits, so a waiter that was
    /// signalled always consumes its signal and never leaves a ready queue
    /// with an idle waiter behind it. Giving up never modifies the items.
    pub fn wait_limited(
        &self,
        condition: Condition,
        limit: WaitLimit<'_>,
    ) -> Result<Items<'_, T>, QueueError> {
        let condvar = self.condvar(condition);
        let mut items = self.lock();

        loop {
            if self.holds(condition, &items) {
                return Ok(items);
            }

            if limit.token.is_some_and(CancelToken::is_cancelled) {
                tracing::trace!(target: crate::TRACING_TARGET, ?condition, "wait cancelled");
                return Err(QueueError::Cancelled);
            }

            items = match limit.deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::trace!(target: crate::TRACING_TARGET, ?condition, "wait timed out");
                        return Err(QueueError::TimedOut);
                    }
                    condvar
                        .wait_timeout(items, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => condvar.wait(items).unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}

impl<T: Send> Interrupt for QueueCore<T> {
    fn interrupt(&self) {
        // Taking the lock orders this wake-up after any waiter that is between
        // its token check and its wait, so the wake-up cannot be lost.
        let _items = self.lock();
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}
