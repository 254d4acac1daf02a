//! Cancellation handles for waiting queue operations
//!
//! A [`CancelToken`] is shared between the thread that waits and whoever may
//! want to abort that wait. Cancelling wakes every queue wait currently
//! registered with the token. Waits that already saw their condition satisfied
//! complete normally; the rest return [`QueueError::Cancelled`](crate::QueueError::Cancelled)
//! without touching the queue.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Something blocked on a condition that can be woken from the outside
pub(crate) trait Interrupt: Send + Sync {
    /// Wakes every waiter so it re-evaluates its predicate and token
    fn interrupt(&self);
}

type Waiter = Weak<dyn Interrupt>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    waiters: Vec<(u64, Waiter)>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    registry: Mutex<Registry>,
}

/// Cloneable, sticky cancellation flag
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    /// Creates a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token and wakes all registered waits.
    ///
    /// Calling this more than once has no further effect.
    pub fn cancel(&self) {
        let waiters = {
            let mut registry = self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner);
            if self.inner.cancelled.swap(true, Ordering::AcqRel) {
                return;
            }
            mem::take(&mut registry.waiters)
        };

        tracing::trace!(target: crate::TRACING_TARGET, waiters = waiters.len(), "cancel token fired");

        // The registry lock is released here: interrupting takes queue locks.
        for (_, waiter) in waiters {
            if let Some(waiter) = waiter.upgrade() {
                waiter.interrupt();
            }
        }
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Registers `waiter` until the returned guard is dropped.
    ///
    /// Must be called without holding the waiter's own lock.
    pub(crate) fn register(&self, waiter: Waiter) -> Registration<'_> {
        let mut registry = self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.waiters.push((id, waiter));
        Registration { token: self, id }
    }

    fn deregister(&self, id: u64) {
        let mut registry = self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = registry.waiters.iter().position(|(wid, _)| *wid == id) {
            registry.waiters.swap_remove(pos);
        }
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.inner.registry.lock().unwrap().waiters.len()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Keeps a waiter registered with a token for the duration of one wait
pub(crate) struct Registration<'a> {
    token: &'a CancelToken,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.token.deregister(self.id);
    }
}
