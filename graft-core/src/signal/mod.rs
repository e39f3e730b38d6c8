//! Signals
//!
//! This module implements the signal abstraction: a handle over a store
//! bundling subscription, a synchronous read and a path-addressed write.
//!
//! # Concepts
//!
//! ## Stores
//!
//! A store is anything that can produce a `(subscribe, get, set)` triple
//! ([`SignalParts`]). [`Atom`] is the in-memory store shipped with the crate;
//! factories are free to wrap any other state container.
//!
//! ## Derivation
//!
//! Nested paths are addressed by derived signals, which share the parent's
//! store and only wake their subscribers when the narrowed value changes.
//!
//! ## Identity
//!
//! The [`SignalCache`] hands out one signal per tuple of key objects, which
//! is what keeps subscriptions stable when a tree re-executes the same
//! construction call on every render.
//!
//! # Notification model
//!
//! Everything is synchronous: `set` returns after every subscriber ran.
//! A subscriber that writes to another signal recurses immediately; cycles
//! of mutually triggering signals are the caller's problem.

mod atom;
mod cache;
mod handle;
mod options;
mod pending;
mod subscription;

pub use self::atom::Atom;
pub use self::cache::{Key, SignalCache};
pub use self::handle::{Access, GetFn, SetFn, Signal, SignalId, SignalParts, SubscribeFn};
pub use self::options::{PendingMode, PendingPolicy, SignalOptions, SignalsConfig, UnwrapHook};
pub use self::pending::{Pending, Resolver};
pub use self::subscription::{Callback, SubscriberId, SubscriptionSet, Unsubscribe};

use crate::error::Result;
use crate::value::Value;

/// Test for the signal marker without running any user code.
pub fn is_signal(value: &Value) -> bool {
    value.is_signal()
}

pub fn subscribe<F>(signal: &Signal, callback: F) -> Unsubscribe
where
    F: Fn() + Send + Sync + 'static,
{
    signal.subscribe(callback)
}

/// Read a signal the way the render path does.
pub fn read(signal: &Signal) -> Result<Value> {
    signal.read()
}
