//! Signal Factory Cache
//!
//! Memoizes signal construction per ordered tuple of key objects, so a tree
//! that re-executes the same construction call on every render keeps getting
//! the same signal (and therefore the same subscriptions).
//!
//! # Weak keying
//!
//! Keys are compared by identity. An entry holds only weak references to its
//! keys and counts as live while every one of them is still alive. Dead
//! entries are replaced when their address is reused and are removed by
//! [`SignalCache::sweep`], which also runs on its own as inserts pile up.
//!
//! Constructors run outside the map lock, so a constructor may itself call
//! into the cache. If two constructions race for one key tuple, the first
//! live entry inserted wins and the other signal is discarded.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::handle::Signal;
use crate::error::{Error, Result};

/// Minimum number of inserts between two automatic sweeps.
const SWEEP_INTERVAL: usize = 64;

/// An identity-compared cache key.
#[derive(Clone)]
pub struct Key(Arc<dyn Any + Send + Sync>);

impl Key {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Key) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    fn downgrade(&self) -> Weak<dyn Any + Send + Sync> {
        Arc::downgrade(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:#x})", self.addr())
    }
}

type Addrs = SmallVec<[usize; 4]>;

struct CacheEntry {
    keys: SmallVec<[Weak<dyn Any + Send + Sync>; 4]>,
    signal: Signal,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        self.keys.iter().all(|key| key.strong_count() > 0)
    }
}

/// Identity-keyed, weakly-held memo of constructed signals.
#[derive(Default)]
pub struct SignalCache {
    entries: DashMap<Addrs, CacheEntry>,
    inserts_since_sweep: AtomicUsize,
}

impl SignalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the signal cached for `keys`, constructing it on a miss.
    pub fn get_or_create<F>(&self, keys: &[Key], create: F) -> Result<Signal>
    where
        F: FnOnce(&[Key]) -> Signal,
    {
        if keys.is_empty() {
            return Err(Error::EmptyCacheKey);
        }
        let addrs: Addrs = keys.iter().map(Key::addr).collect();

        if let Some(entry) = self.entries.get(&addrs) {
            if entry.is_live() {
                trace!(keys = keys.len(), "signal cache hit");
                return Ok(entry.signal.clone());
            }
        }

        trace!(keys = keys.len(), "signal cache miss");
        let signal = create(keys);
        let fresh = CacheEntry {
            keys: keys.iter().map(Key::downgrade).collect(),
            signal: signal.clone(),
        };

        let cached = match self.entries.entry(addrs) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live() {
                    occupied.get().signal.clone()
                } else {
                    occupied.insert(fresh);
                    signal
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                signal
            }
        };

        let inserts = self.inserts_since_sweep.fetch_add(1, Ordering::Relaxed) + 1;
        if inserts >= SWEEP_INTERVAL.max(self.entries.len()) {
            self.sweep();
        }
        Ok(cached)
    }

    /// Drop every entry whose keys are no longer all alive.
    pub fn sweep(&self) -> usize {
        self.inserts_since_sweep.store(0, Ordering::Relaxed);
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "swept signal cache");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SignalCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
