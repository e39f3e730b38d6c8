//! Tree-Build Interceptor
//!
//! [`Injected`] wraps a tree-building primitive. Every call is classified
//! first:
//!
//! 1. No signals: delegate unchanged.
//! 2. Direct patch: a boundary starting in uncontrolled mode renders the
//!    node once from the current readings with an [`InstanceBinder`] as its
//!    ref. Later changes are patched onto the instance.
//! 3. Rerender: a boundary in controlled mode re-runs the primitive with
//!    filled props and children whenever one of its signals fires.
//!
//! Both signal strategies go through the boundary, so a direct-patch node
//! that cannot be patched any more can be promoted in place.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::binder::{InstanceBinder, Readings};
use super::boundary::{BoundaryProps, RerenderBoundary};
use super::classify::{Strategy, Usage};
use crate::error::Result;
use crate::render::Renderers;
use crate::signal::Signal;
use crate::tree::{
    fill_all_signal_values, remove_signals, Component, Element, ElementType, NodeRef,
    TreeBuilder, REF_PROP,
};
use crate::value::{Callable, Props, Value};

/// A tree-building primitive with signal support.
pub struct Injected<B> {
    builder: Arc<B>,
    renderers: Arc<Renderers>,
    boundary: Arc<dyn Component>,
}

impl<B: TreeBuilder + 'static> Injected<B> {
    pub fn new(builder: B, renderers: Arc<Renderers>) -> Self {
        Self::with_boundary(builder, renderers, Arc::new(RerenderBoundary::new()))
    }

    /// Share one boundary type between several interceptors.
    pub fn with_boundary(builder: B, renderers: Arc<Renderers>, boundary: Arc<dyn Component>) -> Self {
        Self {
            builder: Arc::new(builder),
            renderers,
            boundary,
        }
    }

    /// The element type boundaries are built with.
    pub fn boundary_type(&self) -> ElementType {
        ElementType::Component(Arc::clone(&self.boundary))
    }

    pub fn inner(&self) -> &B {
        &self.builder
    }
}

impl<B> Clone for Injected<B> {
    fn clone(&self) -> Self {
        Self {
            builder: Arc::clone(&self.builder),
            renderers: Arc::clone(&self.renderers),
            boundary: Arc::clone(&self.boundary),
        }
    }
}

impl<B: TreeBuilder + 'static> TreeBuilder for Injected<B> {
    fn build(&self, ty: ElementType, props: Props, children: Vec<Value>) -> Element {
        let usage = Usage::classify(&ty, &props, &children);
        trace!(
            ty = ?ty,
            strategy = ?usage.strategy,
            children_signals = usage.children_signals.len(),
            prop_keys = usage.prop_signals.len(),
            "classified tree-building call"
        );
        if usage.strategy == Strategy::PassThrough {
            return self.builder.build(ty, props, children);
        }

        let uncontrolled = usage.strategy == Strategy::DirectPatch;
        let signals = usage.all_signals();
        let builder: Arc<dyn TreeBuilder> = self.builder.clone();
        let plan = Arc::new(RenderPlan {
            builder,
            renderers: Arc::clone(&self.renderers),
            ty,
            props,
            children: children.into(),
            usage,
        });
        let render = Callable::from_fn(move |args| {
            let element = match args.first() {
                Some(fallback) => plan.render(fallback)?,
                None => plan.render(&Value::Null)?,
            };
            Ok(Value::Element(element))
        });

        let boundary_props = BoundaryProps {
            signals,
            uncontrolled,
            render,
        };
        self.builder
            .build(self.boundary_type(), boundary_props.to_props(), Vec::new())
    }
}

impl<B> fmt::Debug for Injected<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injected")
            .field("renderers", &self.renderers)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Render plan
// ----------------------------------------------------------------------------

/// Everything a boundary needs to (re)build one intercepted node.
struct RenderPlan {
    builder: Arc<dyn TreeBuilder>,
    renderers: Arc<Renderers>,
    ty: ElementType,
    props: Props,
    children: Arc<[Value]>,
    usage: Usage,
}

impl RenderPlan {
    fn render(&self, fallback: &Value) -> Result<Element> {
        match fallback {
            Value::Function(fallback) => self.render_direct(fallback),
            _ => self.render_filled(),
        }
    }

    /// Controlled mode: every signal replaced by its reading.
    fn render_filled(&self) -> Result<Element> {
        let mut props = Props::with_capacity(self.props.len());
        for (key, value) in &self.props {
            let filled = if self.usage.prop_signals.contains_key(key) {
                fill_all_signal_values(value)?
            } else {
                value.clone()
            };
            props.insert(key.clone(), filled);
        }
        let children = self
            .children
            .iter()
            .map(fill_all_signal_values)
            .collect::<Result<Vec<_>>>()?;
        Ok(self.builder.build(self.ty.clone(), props, children))
    }

    /// Uncontrolled mode: build from current readings and bind the instance.
    fn render_direct(&self, fallback: &Callable) -> Result<Element> {
        let readings: Readings = self
            .usage
            .all_signals()
            .into_iter()
            .map(|signal| {
                let reading = signal.read().ok().filter(|value| !value.is_pending());
                (signal, reading)
            })
            .collect();
        let unavailable: Vec<Signal> = readings
            .iter()
            .filter(|(_, reading)| reading.is_none())
            .map(|(signal, _)| signal.clone())
            .collect();

        let mut user_ref: Option<NodeRef> = None;
        let mut props = Props::with_capacity(self.props.len() + 1);
        for (key, value) in &self.props {
            if key == REF_PROP {
                if let Value::Ref(node_ref) = value {
                    user_ref = Some(node_ref.clone());
                }
                continue;
            }
            if !self.usage.prop_signals.contains_key(key) {
                props.insert(key.clone(), value.clone());
                continue;
            }
            if let Some(available) = remove_signals(value, &unavailable) {
                props.insert(key.clone(), fill_all_signal_values(&available)?);
            }
        }

        let mut demote = false;
        let mut children = Vec::with_capacity(self.children.len());
        for child in self.children.iter() {
            match child {
                Value::Signal(signal) => match readings.get(signal) {
                    Some(Some(reading)) if reading.is_displayable() => children.push(reading.clone()),
                    _ => demote = true,
                },
                other => children.push(other.clone()),
            }
        }

        let binder = InstanceBinder::new(
            Arc::clone(&self.renderers),
            Arc::clone(&self.children),
            self.usage.children_signals.clone(),
            self.props.clone(),
            self.usage.prop_signals.clone(),
            fallback.clone(),
        )
        .with_readings(readings)
        .with_user_ref(user_ref);
        props.insert(REF_PROP.to_string(), Value::Ref(binder.into_node_ref()));

        let element = self.builder.build(self.ty.clone(), props, children);
        if demote {
            debug!("children no longer displayable, promoting to rerender");
            fallback.call(&[])?;
        }
        Ok(element)
    }
}
