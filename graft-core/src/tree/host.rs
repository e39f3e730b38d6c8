//! Host runtime interface.
//!
//! The core needs exactly three things from the host UI runtime:
//!
//! 1. Render a composite type and keep its per-mount state across renders
//!    ([`Component`] / [`MountedComponent::render`]).
//! 2. Run something after mount or after a commit, and clean up on unmount
//!    ([`MountedComponent::committed`] / [`MountedComponent::unmount`]).
//! 3. Force one component to re-render without touching its parent
//!    ([`RerenderHandle`]).
//!
//! Concrete instances reach the core through ref-style callbacks
//! ([`NodeRef`]) stored under the reserved `ref` prop.

use std::fmt;
use std::sync::Arc;

use super::element::Element;
use crate::error::Result;
use crate::render::Instance;
use crate::value::Props;

/// Asks the host to re-render the component that owns the handle.
pub type RerenderHandle = Arc<dyn Fn() + Send + Sync>;

/// A composite element type.
///
/// Hosts reconcile component types by pointer identity, so a component is
/// usually created once and shared.
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    /// Create the per-mount state of one instance of this component.
    fn mount(&self, rerender: RerenderHandle) -> Box<dyn MountedComponent>;
}

/// One mounted instance of a [`Component`].
pub trait MountedComponent: Send {
    /// Produce content for the current props.
    fn render(&mut self, props: &Props) -> Result<Element>;

    /// Runs after the rendered content has been committed.
    fn committed(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs once before the instance goes away.
    fn unmount(&mut self) {}
}

type RefFn = dyn Fn(Option<&Instance>) -> Result<()> + Send + Sync;

/// Instance-acquisition callback.
///
/// The host calls it with the concrete instance once mounted and with `None`
/// when the instance is detached or the callback is replaced.
#[derive(Clone)]
pub struct NodeRef(Arc<RefFn>);

impl NodeRef {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(Option<&Instance>) -> Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    pub fn attach(&self, instance: &Instance) -> Result<()> {
        (self.0)(Some(instance))
    }

    pub fn detach(&self) -> Result<()> {
        (self.0)(None)
    }

    pub fn ptr_eq(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodeRef(..)")
    }
}
