//! In-memory store.
//!
//! `Atom` is the simplest store a factory can hand out: one value and a
//! listener map. Writes go through [`Value::with_path`], so every container
//! along the written path gets a new identity and siblings keep theirs.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::handle::SignalParts;
use super::subscription::{Callback, SubscriberId, Unsubscribe};
use crate::value::{PathKey, Value};

/// A value plus its listeners.
pub struct Atom {
    value: RwLock<Value>,
    listeners: Mutex<IndexMap<SubscriberId, Callback>>,
}

impl Atom {
    pub fn new(initial: impl Into<Value>) -> Arc<Self> {
        Arc::new(Self {
            value: RwLock::new(initial.into()),
            listeners: Mutex::new(IndexMap::new()),
        })
    }

    pub fn get(&self) -> Value {
        self.value.read().clone()
    }

    /// Write `value` at `path` and notify every listener synchronously.
    pub fn set(&self, path: &[PathKey], value: Value) {
        {
            let mut guard = self.value.write();
            let next = guard.with_path(path, value);
            *guard = next;
        }
        trace!(depth = path.len(), "atom updated");
        self.notify();
    }

    pub fn subscribe(self: &Arc<Self>, callback: Callback) -> Unsubscribe {
        let id = SubscriberId::new();
        self.listeners.lock().insert(id, callback);

        let atom = Arc::downgrade(self);
        Unsubscribe::new(move || {
            if let Some(atom) = atom.upgrade() {
                atom.listeners.lock().shift_remove(&id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Expose the atom as a signal triple.
    pub fn parts(self: &Arc<Self>) -> SignalParts {
        let subscribe = Arc::clone(self);
        let get = Arc::clone(self);
        let set = Arc::clone(self);
        SignalParts::new(
            move |callback| subscribe.subscribe(callback),
            move || get.get(),
            move |path, value| set.set(path, value),
        )
    }

    fn notify(&self) {
        // Listeners may subscribe or unsubscribe while we iterate; walk a
        // snapshot of ids and skip the ones removed in the meantime.
        let ids: Vec<SubscriberId> = self.listeners.lock().keys().copied().collect();
        for id in ids {
            let callback = self.listeners.lock().get(&id).cloned();
            if let Some(callback) = callback {
                callback();
            }
        }
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("value", &self.get())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
