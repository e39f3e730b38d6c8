//! Signal factory
//!
//! [`create_signals`] is the public entry point. It takes the store
//! constructor, the shared options and the renderer registry, and returns a
//! [`Signals`] handle with:
//!
//! - [`Signals::get_signal`]: the memoized signal for a tuple of key objects.
//! - [`Signals::inject`]: wrap any tree-building primitive.
//! - [`Signals::create_element`]: the plain primitive, already wrapped.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::inject::{Injected, RerenderBoundary};
use crate::render::Renderers;
use crate::signal::{Key, Signal, SignalCache, SignalOptions, SignalParts};
use crate::tree::{Component, Element, ElementBuilder, ElementType, TreeBuilder};
use crate::value::{Props, Value};

type Constructor = dyn Fn(&[Key]) -> SignalParts + Send + Sync;

/// Create a signal factory over a store constructor.
///
/// The constructor runs once per distinct key tuple and receives the keys
/// that addressed it.
pub fn create_signals<F>(constructor: F, options: SignalOptions, renderers: Arc<Renderers>) -> Signals
where
    F: Fn(&[Key]) -> SignalParts + Send + Sync + 'static,
{
    let boundary: Arc<dyn Component> = Arc::new(RerenderBoundary::new());
    let create_element = Injected::with_boundary(ElementBuilder, Arc::clone(&renderers), Arc::clone(&boundary));
    Signals {
        constructor: Arc::new(constructor),
        options: Arc::new(options),
        renderers,
        cache: Arc::new(SignalCache::new()),
        boundary,
        create_element,
    }
}

/// A signal factory.
#[derive(Clone)]
pub struct Signals {
    constructor: Arc<Constructor>,
    options: Arc<SignalOptions>,
    renderers: Arc<Renderers>,
    cache: Arc<SignalCache>,
    boundary: Arc<dyn Component>,
    create_element: Injected<ElementBuilder>,
}

impl Signals {
    /// The signal for `keys`, identical across calls with the same keys.
    pub fn get_signal(&self, keys: &[Key]) -> Result<Signal> {
        self.cache.get_or_create(keys, |keys| {
            Signal::wrap((self.constructor)(keys), Arc::clone(&self.options))
        })
    }

    /// Wrap a tree-building primitive with signal interception.
    ///
    /// Every interceptor from one factory shares the same boundary type.
    pub fn inject<B: TreeBuilder + 'static>(&self, builder: B) -> Injected<B> {
        Injected::with_boundary(builder, Arc::clone(&self.renderers), Arc::clone(&self.boundary))
    }

    /// Build through the intercepted plain primitive.
    pub fn create_element(&self, ty: ElementType, props: Props, children: Vec<Value>) -> Element {
        self.create_element.build(ty, props, children)
    }

    pub fn element_builder(&self) -> &Injected<ElementBuilder> {
        &self.create_element
    }

    pub fn options(&self) -> &Arc<SignalOptions> {
        &self.options
    }

    pub fn renderers(&self) -> &Arc<Renderers> {
        &self.renderers
    }

    pub fn cache(&self) -> &SignalCache {
        &self.cache
    }
}

impl fmt::Debug for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signals")
            .field("options", &self.options)
            .field("renderers", &self.renderers)
            .field("cache", &self.cache)
            .finish()
    }
}
