//! Subscription plumbing.
//!
//! A subscription is represented on the caller's side by an [`Unsubscribe`]
//! handle. Owners that track many subscriptions keep them in a
//! [`SubscriptionSet`], which is only ever drained as a whole.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A change notification callback.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Unique identifier for a registered listener.
///
/// Stores use this to find the listener again when its subscription is
/// cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Handle that removes one registration.
///
/// Clones share the same registration. Cancelling more than once is a no-op.
/// Dropping the handle does not cancel anything.
#[derive(Clone)]
pub struct Unsubscribe {
    cancel: Arc<Mutex<Option<CancelFn>>>,
}

impl Unsubscribe {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Arc::new(Mutex::new(Some(Box::new(cancel)))),
        }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(None)),
        }
    }

    /// Remove the registration.
    pub fn unsubscribe(&self) {
        // Take before calling: the cancel closure may re-enter the store.
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.is_active())
            .finish()
    }
}

/// The active subscriptions of one binder or boundary.
///
/// Lifecycle: created empty, filled on mount or when the tracked signal set
/// changes, drained completely before refilling and on teardown. Dropping
/// the set drains it.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    entries: Vec<Unsubscribe>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unsubscribe: Unsubscribe) {
        self.entries.push(unsubscribe);
    }

    /// Cancel every entry, in registration order, then clear.
    pub fn drain(&mut self) {
        for entry in self.entries.drain(..) {
            entry.unsubscribe();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.drain();
    }
}
