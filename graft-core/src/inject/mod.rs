//! Signal injection
//!
//! The interception layer between user code and the tree-building
//! primitive:
//!
//! - [`classify`] finds the signals a node depends on and picks a strategy.
//! - [`binder`] patches mounted instances directly.
//! - [`boundary`] re-renders a subtree when its signals fire.
//! - [`interceptor`] wires the three together behind [`TreeBuilder`].
//!
//! [`TreeBuilder`]: crate::tree::TreeBuilder

pub mod binder;
pub mod boundary;
pub mod classify;
pub mod interceptor;

pub use self::binder::{InstanceBinder, Readings};
pub use self::boundary::{BoundaryProps, RerenderBoundary, SignalList, BOUNDARY_NAME};
pub use self::classify::{is_displayable_signal, Strategy, Usage};
pub use self::interceptor::Injected;
