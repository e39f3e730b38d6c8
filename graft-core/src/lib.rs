//! Graft Core
//!
//! Fine-grained reactive values ("signals") grafted onto a declarative
//! tree-building API. Changing a signal updates only the concrete instances
//! that depend on it, instead of re-running the whole subtree.
//!
//! It implements:
//!
//! - Signals over arbitrary stores, with path derivation and call forwarding
//! - A weakly keyed factory cache for stable signal identity across renders
//! - Deep search, fill and removal of signals inside props and children
//! - A tree-building interceptor choosing between pass-through, direct
//!   instance patching and isolated re-rendering
//!
//! # Architecture
//!
//! - `signal`: the signal handle, subscriptions, stores, options, cache
//! - `tree`: element model, host runtime interface, tree walker
//! - `inject`: usage classifier, instance binder, rerender boundary, interceptor
//! - `render`: render-target adapters and their registry
//! - `factory`: the `create_signals` entry point
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use graft_core::{create_signals, Atom, ElementType, Key, PendingPolicy, Renderers, SignalOptions, Value};
//!
//! struct Counter;
//!
//! let signals = create_signals(
//!     |_keys| Atom::new(0).parts(),
//!     SignalOptions::new(PendingPolicy::PassThrough).value_accessor("value"),
//!     Arc::new(Renderers::headless()),
//! );
//!
//! let key = Key::new(Counter);
//! let count = signals.get_signal(&[key.clone()])?;
//!
//! // Built once; later changes patch the mounted node's text directly.
//! let node = signals.create_element(
//!     ElementType::host("div"),
//!     Default::default(),
//!     vec![Value::from("Count: "), Value::from(count.clone())],
//! );
//!
//! count.set_value(1)?;
//! ```

pub mod error;
pub mod factory;
pub mod inject;
pub mod render;
pub mod signal;
pub mod tree;
pub mod value;

pub use error::{AdapterError, Error, Result};
pub use factory::{create_signals, Signals};
pub use inject::{Injected, RerenderBoundary, Strategy, Usage};
pub use render::{Instance, PropsAdapter, RendererTag, Renderers};
pub use signal::{
    is_signal, read, subscribe, Access, Atom, Key, Pending, PendingMode, PendingPolicy, Resolver,
    Signal, SignalOptions, SignalParts, SignalsConfig, Unsubscribe,
};
pub use tree::{
    Component, Element, ElementBuilder, ElementType, MountedComponent, NodeRef, RerenderHandle,
    TreeBuilder,
};
pub use value::{Callable, Path, PathKey, Props, Value};
