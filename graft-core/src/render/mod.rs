//! Render-target adapters
//!
//! An adapter writes a partial property bag onto one concrete instance. The
//! core never inspects instances itself: each instance carries the tag of the
//! renderer that produced it, and the [`Renderers`] registry dispatches on
//! that tag.
//!
//! # Errors
//!
//! - An instance whose tag has no registered adapter is a configuration
//!   error ([`Error::RendererMismatch`]) and propagates.
//! - An adapter rejecting a value returns an [`AdapterError`]; the instance
//!   binder catches it and promotes the node to the rerender strategy.
//!
//! # Reference adapters
//!
//! Two headless adapters ship with the crate: [`dom::DomAdapter`] over
//! in-memory [`dom::DomNode`]s and [`scene::SceneAdapter`] over
//! [`scene::SceneObject`]s.

pub mod dom;
pub mod scene;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{AdapterError, Error, Result};
use crate::value::Props;

/// Capability tag an adapter registers under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RendererTag(&'static str);

impl RendererTag {
    pub const DOM: RendererTag = RendererTag("dom");
    pub const SCENE: RendererTag = RendererTag("scene");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for RendererTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A concrete rendered instance, opaque to the core.
#[derive(Clone)]
pub struct Instance {
    tag: RendererTag,
    target: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(tag: RendererTag, target: Arc<T>) -> Self {
        Self { tag, target }
    }

    pub fn tag(&self) -> RendererTag {
        self.tag
    }

    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.target.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.target), Arc::as_ptr(&other.target))
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("tag", &self.tag).finish()
    }
}

/// Writes partial props onto instances of one renderer.
pub trait PropsAdapter: Send + Sync {
    fn apply_props(&self, instance: &Instance, props: &Props) -> Result<(), AdapterError>;
}

// ----------------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------------

/// Adapter registry, built once at startup and shared by reference.
#[derive(Clone, Default)]
pub struct Renderers {
    adapters: IndexMap<RendererTag, Arc<dyn PropsAdapter>>,
}

impl Renderers {
    pub fn builder() -> RenderersBuilder {
        RenderersBuilder::default()
    }

    /// A registry with both reference adapters.
    pub fn headless() -> Self {
        Self::builder()
            .register(RendererTag::DOM, dom::DomAdapter)
            .register(RendererTag::SCENE, scene::SceneAdapter)
            .build()
    }

    /// The adapter responsible for `instance`.
    pub fn resolve(&self, instance: &Instance) -> Result<Arc<dyn PropsAdapter>> {
        self.adapters
            .get(&instance.tag())
            .cloned()
            .ok_or(Error::RendererMismatch {
                tag: instance.tag(),
            })
    }

    pub fn apply_props(&self, instance: &Instance, props: &Props) -> Result<()> {
        let adapter = self.resolve(instance)?;
        trace!(tag = %instance.tag(), keys = props.len(), "applying props");
        adapter.apply_props(instance, props)?;
        Ok(())
    }

    pub fn tags(&self) -> impl Iterator<Item = RendererTag> + '_ {
        self.adapters.keys().copied()
    }
}

impl fmt::Debug for Renderers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderers")
            .field("tags", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`Renderers`].
#[derive(Default)]
pub struct RenderersBuilder {
    adapters: IndexMap<RendererTag, Arc<dyn PropsAdapter>>,
}

impl RenderersBuilder {
    /// Register `adapter` under `tag`, replacing any earlier registration.
    pub fn register(self, tag: RendererTag, adapter: impl PropsAdapter + 'static) -> Self {
        self.register_shared(tag, Arc::new(adapter))
    }

    pub fn register_shared(mut self, tag: RendererTag, adapter: Arc<dyn PropsAdapter>) -> Self {
        self.adapters.insert(tag, adapter);
        self
    }

    pub fn build(self) -> Renderers {
        Renderers {
            adapters: self.adapters,
        }
    }
}
