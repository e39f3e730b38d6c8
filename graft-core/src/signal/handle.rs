//! Signal Implementation
//!
//! A Signal is a handle bundling three capabilities of some underlying
//! store: change subscription, a synchronous read and a path-addressed write.
//!
//! # Derivation
//!
//! Any signal can be narrowed to a nested path with [`Signal::field`]. The
//! derived signal shares the parent's store:
//!
//! - `get` reads the parent and then the field (binding methods to the object
//!   they were read off).
//! - `set(path, v)` forwards to the parent as `set([field, ...path], v)`.
//! - `subscribe` piggybacks on the parent but only forwards a notification
//!   when the narrowed value changed under [`Value::same`]. Functions are
//!   assumed impure and always forward.
//!
//! Invoking a signal with [`Signal::call`] yields a read-only signal over
//! "the result of calling the current value with these arguments".
//!
//! # Identity
//!
//! Signals compare and hash by handle. Two derivations of the same path are
//! distinct handles that behave the same; stable identity across renders is
//! what the factory cache provides.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::options::SignalOptions;
use super::subscription::{Callback, Unsubscribe};
use crate::error::{Error, Result};
use crate::value::{Path, PathKey, Props, Value};

/// Registers a callback and hands back its cancellation handle.
pub type SubscribeFn = Arc<dyn Fn(Callback) -> Unsubscribe + Send + Sync>;

/// Reads the current value.
pub type GetFn = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// Writes a value at a path relative to the signal's reference point.
pub type SetFn = Arc<dyn Fn(&[PathKey], Value) -> Result<()> + Send + Sync>;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier of a signal handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    fn next() -> Self {
        Self(SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The `(subscribe, get, set)` triple a store exposes.
#[derive(Clone)]
pub struct SignalParts {
    pub(crate) subscribe: SubscribeFn,
    pub(crate) get: GetFn,
    pub(crate) set: SetFn,
}

impl SignalParts {
    /// Build parts from an infallible store.
    pub fn new<S, G, W>(subscribe: S, get: G, set: W) -> Self
    where
        S: Fn(Callback) -> Unsubscribe + Send + Sync + 'static,
        G: Fn() -> Value + Send + Sync + 'static,
        W: Fn(&[PathKey], Value) + Send + Sync + 'static,
    {
        Self::fallible(
            subscribe,
            move || Ok(get()),
            move |path, value| {
                set(path, value);
                Ok(())
            },
        )
    }

    /// Build parts whose reads and writes may fail.
    pub fn fallible<S, G, W>(subscribe: S, get: G, set: W) -> Self
    where
        S: Fn(Callback) -> Unsubscribe + Send + Sync + 'static,
        G: Fn() -> Result<Value> + Send + Sync + 'static,
        W: Fn(&[PathKey], Value) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            subscribe: Arc::new(subscribe),
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }
}

/// Result of a proxy-style property access.
#[derive(Debug, Clone)]
pub enum Access {
    /// An eager reading (value accessor, or an attribute in non-recursive mode).
    Value(Value),
    /// A derived signal addressing the accessed path.
    Signal(Signal),
}

/// A reactive handle over a store.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    id: SignalId,
    subscribe: SubscribeFn,
    get: GetFn,
    set: SetFn,
    options: Arc<SignalOptions>,
    /// Attributes written through `assign` in non-recursive mode.
    attrs: Mutex<Props>,
}

impl Signal {
    /// Wrap a store's triple into a signal.
    pub fn wrap(parts: SignalParts, options: Arc<SignalOptions>) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SignalId::next(),
                subscribe: parts.subscribe,
                get: parts.get,
                set: parts.set,
                options,
                attrs: Mutex::new(Props::new()),
            }),
        }
    }

    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    pub fn options(&self) -> &Arc<SignalOptions> {
        &self.inner.options
    }

    pub fn ptr_eq(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register interest in changes.
    pub fn subscribe<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe_callback(Arc::new(callback))
    }

    pub fn subscribe_callback(&self, callback: Callback) -> Unsubscribe {
        (self.inner.subscribe)(callback)
    }

    /// The raw current value.
    pub fn get(&self) -> Result<Value> {
        (self.inner.get)()
    }

    /// The current value with the factory's pending policy applied.
    ///
    /// This is the reading the render path uses.
    pub fn read(&self) -> Result<Value> {
        self.inner.options.pending.apply(self.get()?)
    }

    /// Request a write at `path`; subscribers are notified before this returns.
    pub fn set(&self, path: &[PathKey], value: Value) -> Result<()> {
        (self.inner.set)(path, value)
    }

    /// Replace the whole value.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        self.set(&[], value.into())
    }

    /// Derive a signal addressing `name` below this one.
    pub fn field(&self, name: &str) -> Signal {
        let key: PathKey = Arc::from(self.inner.options.resolve_key(name));
        self.derive(key)
    }

    /// Derive a signal addressing a nested path.
    pub fn path<I, K>(&self, keys: I) -> Signal
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter()
            .fold(self.clone(), |signal, key| signal.field(key.as_ref()))
    }

    /// A read-only signal over the result of invoking the current value.
    pub fn call(&self, args: Vec<Value>) -> Signal {
        let parent = self.clone();
        let args: Arc<[Value]> = args.into();
        Signal::wrap(
            SignalParts {
                subscribe: Arc::clone(&self.inner.subscribe),
                get: Arc::new(move || match parent.get()? {
                    Value::Function(func) => func.call(&args),
                    _ => Err(Error::NotCallable),
                }),
                set: Arc::new(|_: &[PathKey], _: Value| {
                    Err(Error::InvalidOperation {
                        reason: "the signal was derived from a call",
                    })
                }),
            },
            Arc::clone(&self.inner.options),
        )
    }

    /// Proxy-style property read.
    ///
    /// The value accessor reads eagerly. Other names derive a signal in
    /// recursive mode and read a stored attribute otherwise.
    pub fn access(&self, name: &str) -> Result<Access> {
        let options = &self.inner.options;
        if options.is_value_accessor(name) {
            return self.get().map(Access::Value);
        }
        if options.recursive {
            return Ok(Access::Signal(self.field(name)));
        }
        let key = options.resolve_key(name);
        let attr = self.inner.attrs.lock().get(key).cloned();
        Ok(Access::Value(attr.unwrap_or_default()))
    }

    /// Proxy-style property write.
    ///
    /// Writing the value accessor sets the whole value. Recursive signals
    /// reject every other name so that all writes go through `set`.
    pub fn assign(&self, name: &str, value: Value) -> Result<()> {
        let options = &self.inner.options;
        if options.is_value_accessor(name) {
            return self.set(&[], value);
        }
        if options.recursive {
            return Err(Error::ReadOnlyProperty {
                name: name.to_string(),
            });
        }
        self.inner.attrs.lock().insert(name.to_string(), value);
        Ok(())
    }

    fn derive(&self, key: PathKey) -> Signal {
        let subscribe: SubscribeFn = {
            let parent = self.clone();
            let key = key.clone();
            Arc::new(move |callback: Callback| {
                let previous = Mutex::new(narrow(&parent, &key).ok());
                let source = parent.clone();
                let key = key.clone();
                parent.subscribe(move || {
                    if let Ok(next) = narrow(&source, &key) {
                        let mut previous = previous.lock();
                        let unchanged = !next.is_invocable()
                            && previous.as_ref().is_some_and(|prev| prev.same(&next));
                        *previous = Some(next);
                        if unchanged {
                            return;
                        }
                    }
                    callback();
                })
            })
        };

        let get: GetFn = {
            let parent = self.clone();
            let key = key.clone();
            Arc::new(move || {
                let object = parent.get()?;
                match object.get_field(&key)? {
                    Value::Function(method) => Ok(Value::Function(method.bind(object))),
                    other => Ok(other),
                }
            })
        };

        let set: SetFn = {
            let parent = self.clone();
            Arc::new(move |path: &[PathKey], value: Value| {
                let mut full = Path::with_capacity(path.len() + 1);
                full.push(key.clone());
                full.extend(path.iter().cloned());
                parent.set(&full, value)
            })
        };

        Signal::wrap(
            SignalParts {
                subscribe,
                get,
                set,
            },
            Arc::clone(&self.inner.options),
        )
    }
}

fn narrow(parent: &Signal, key: &str) -> Result<Value> {
    parent.get()?.get_field(key)
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Signal {}

impl Hash for Signal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id.raw())
            .field("recursive", &self.inner.options.recursive)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
