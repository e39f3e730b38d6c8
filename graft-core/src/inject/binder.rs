//! Instance Binder
//!
//! The ref-style callback attached to a direct-patch node. Once the host
//! hands it the mounted instance, the binder subscribes to the node's
//! signals and writes each change straight onto the instance through the
//! render-target adapter, one key at a time:
//!
//! - a children signal patches `{ children: <joined text> }`
//! - a prop signal patches `{ <key>: <filled prop value> }`
//!
//! A reading that can no longer be patched, or an adapter rejecting the
//! patch, calls the fallback instead of failing: the owning boundary flips
//! to the rerender strategy. Detaching drains every subscription.
//!
//! # Mount race
//!
//! The node was built from readings taken at render time. If a signal moved
//! on before the instance attached, the binder patches it right away.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::boundary::reading_moved;
use crate::error::Result;
use crate::render::{Instance, PropsAdapter, Renderers};
use crate::signal::{Signal, SubscriptionSet};
use crate::tree::{fill_all_signal_values, NodeRef};
use crate::value::{Callable, Props, Value};

/// Readings a node was built from; `None` marks a reading that failed.
pub type Readings = IndexMap<Signal, Option<Value>>;

/// Binds one node instantiation to its signals.
pub struct InstanceBinder {
    renderers: Arc<Renderers>,
    children: Arc<[Value]>,
    children_signals: Vec<Signal>,
    props: Props,
    prop_signals: IndexMap<String, Vec<Signal>>,
    fallback: Callable,
    readings: Readings,
    user_ref: Option<NodeRef>,
    subscriptions: Mutex<SubscriptionSet>,
}

impl InstanceBinder {
    pub fn new(
        renderers: Arc<Renderers>,
        children: Arc<[Value]>,
        children_signals: Vec<Signal>,
        props: Props,
        prop_signals: IndexMap<String, Vec<Signal>>,
        fallback: Callable,
    ) -> Self {
        Self {
            renderers,
            children,
            children_signals,
            props,
            prop_signals,
            fallback,
            readings: Readings::new(),
            user_ref: None,
            subscriptions: Mutex::new(SubscriptionSet::new()),
        }
    }

    /// Record the readings the node was built with.
    pub fn with_readings(mut self, readings: Readings) -> Self {
        self.readings = readings;
        self
    }

    /// Chain a caller-supplied ref, invoked after the binder.
    pub fn with_user_ref(mut self, user_ref: Option<NodeRef>) -> Self {
        self.user_ref = user_ref;
        self
    }

    pub fn into_node_ref(self) -> NodeRef {
        let binder = Arc::new(self);
        NodeRef::new(move |instance| binder.bind(instance))
    }

    fn bind(&self, instance: Option<&Instance>) -> Result<()> {
        let mut previous = std::mem::take(&mut *self.subscriptions.lock());
        previous.drain();

        let Some(instance) = instance else {
            trace!("instance detached");
            return match &self.user_ref {
                Some(user_ref) => user_ref.detach(),
                None => Ok(()),
            };
        };

        let adapter = self.renderers.resolve(instance)?;
        let target = Arc::new(PatchTarget {
            instance: instance.clone(),
            adapter,
            fallback: self.fallback.clone(),
        });

        let mut subscriptions = SubscriptionSet::new();
        if !self.children_signals.is_empty() {
            let children = Arc::clone(&self.children);
            for signal in &self.children_signals {
                let target = Arc::clone(&target);
                let children = Arc::clone(&children);
                let watched = signal.clone();
                subscriptions.push(signal.subscribe(move || {
                    target.on_children_signal(&watched, &children);
                }));
            }
        }
        for (key, signals) in &self.prop_signals {
            let Some(template) = self.props.get(key) else {
                continue;
            };
            for signal in signals {
                let target = Arc::clone(&target);
                let key = key.clone();
                let template = template.clone();
                let watched = signal.clone();
                subscriptions.push(signal.subscribe(move || {
                    target.on_prop_signal(&watched, &key, &template);
                }));
            }
        }
        trace!(
            tag = %instance.tag(),
            subscriptions = subscriptions.len(),
            "instance bound"
        );
        *self.subscriptions.lock() = subscriptions;

        self.catch_up(&target);

        match &self.user_ref {
            Some(user_ref) => user_ref.attach(instance),
            None => Ok(()),
        }
    }

    fn catch_up(&self, target: &PatchTarget) {
        if self.children_signals.iter().any(|s| self.moved(s)) {
            debug!("children changed before mount");
            if let Some(signal) = self.children_signals.first() {
                target.on_children_signal(signal, &self.children);
            }
        }
        for (key, signals) in &self.prop_signals {
            let moved = signals.iter().find(|s| self.moved(s));
            if let (Some(signal), Some(template)) = (moved, self.props.get(key)) {
                debug!(key = %key, "prop changed before mount");
                target.on_prop_signal(signal, key, template);
            }
        }
    }

    fn moved(&self, signal: &Signal) -> bool {
        let Some(recorded) = self.readings.get(signal) else {
            return false;
        };
        let now = signal.read().ok().filter(|value| !value.is_pending());
        match (recorded, now) {
            (Some(before), Some(now)) => reading_moved(before, &now),
            (None, None) => false,
            _ => true,
        }
    }
}

impl fmt::Debug for InstanceBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceBinder")
            .field("children_signals", &self.children_signals.len())
            .field("prop_keys", &self.prop_signals.keys().collect::<Vec<_>>())
            .field("subscriptions", &self.subscriptions.lock().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Patching
// ----------------------------------------------------------------------------

struct PatchTarget {
    instance: Instance,
    adapter: Arc<dyn PropsAdapter>,
    fallback: Callable,
}

impl PatchTarget {
    fn on_children_signal(&self, signal: &Signal, children: &[Value]) {
        match signal.read() {
            Ok(value) if value.is_displayable() => {
                if let Err(err) = self.patch_children(children) {
                    self.promote(&err);
                }
            }
            Ok(_) => self.promote(&"children reading is not displayable"),
            Err(err) => self.promote(&err),
        }
    }

    fn on_prop_signal(&self, signal: &Signal, key: &str, template: &Value) {
        match signal.read() {
            Ok(value) if !value.is_pending() => {
                if let Err(err) = self.patch_prop(key, template) {
                    self.promote(&err);
                }
            }
            Ok(_) => self.promote(&"prop reading is pending"),
            Err(err) => self.promote(&err),
        }
    }

    fn patch_children(&self, children: &[Value]) -> Result<()> {
        let mut text = String::new();
        for child in children {
            text.push_str(&fill_all_signal_values(child)?.to_text());
        }
        let mut patch = Props::with_capacity(1);
        patch.insert("children".to_string(), Value::from(text));
        self.apply(&patch)
    }

    fn patch_prop(&self, key: &str, template: &Value) -> Result<()> {
        let mut patch = Props::with_capacity(1);
        patch.insert(key.to_string(), fill_all_signal_values(template)?);
        self.apply(&patch)
    }

    fn apply(&self, patch: &Props) -> Result<()> {
        trace!(tag = %self.instance.tag(), keys = ?patch.keys().collect::<Vec<_>>(), "patching instance");
        self.adapter.apply_props(&self.instance, patch)?;
        Ok(())
    }

    fn promote(&self, reason: &dyn fmt::Display) {
        debug!(reason = %reason, "direct patch failed, falling back to rerender");
        if let Err(err) = self.fallback.call(&[]) {
            debug!(error = %err, "fallback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::render::dom::DomNode;
    use crate::render::RendererTag;
    use crate::signal::{Atom, PendingPolicy, SignalOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn atom_signal(initial: impl Into<Value>) -> (Arc<Atom>, Signal) {
        let atom = Atom::new(initial);
        let options = Arc::new(SignalOptions::new(PendingPolicy::PassThrough));
        let signal = Signal::wrap(atom.parts(), options);
        (atom, signal)
    }

    fn counting_fallback() -> (Arc<AtomicUsize>, Callable) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let fallback = Callable::from_fn(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        });
        (count, fallback)
    }

    fn text_binder(signal: &Signal, fallback: Callable) -> NodeRef {
        let children: Arc<[Value]> = vec![Value::from("Count: "), Value::from(signal.clone())].into();
        InstanceBinder::new(
            Arc::new(Renderers::headless()),
            children,
            vec![signal.clone()],
            Props::new(),
            IndexMap::new(),
            fallback,
        )
        .into_node_ref()
    }

    #[test]
    fn children_changes_patch_text_content() {
        let (_atom, count) = atom_signal(0);
        let (fallbacks, fallback) = counting_fallback();
        let node_ref = text_binder(&count, fallback);
        let node = Arc::new(DomNode::new("div"));

        node_ref.attach(&node.instance()).unwrap();
        count.set_value(1).unwrap();

        assert_eq!(node.text_content(), "Count: 1");
        assert_eq!(fallbacks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn non_displayable_readings_fall_back() {
        let (_atom, count) = atom_signal(0);
        let (fallbacks, fallback) = counting_fallback();
        let node_ref = text_binder(&count, fallback);
        let node = Arc::new(DomNode::new("div"));

        node_ref.attach(&node.instance()).unwrap();
        count.set_value(Value::array(vec![])).unwrap();

        assert_eq!(fallbacks.load(Ordering::SeqCst), 1);
        assert_eq!(node.text_content(), "");
    }

    #[test]
    fn detaching_drains_subscriptions() {
        let (atom, count) = atom_signal(0);
        let (_fallbacks, fallback) = counting_fallback();
        let node_ref = text_binder(&count, fallback);
        let node = Arc::new(DomNode::new("div"));

        node_ref.attach(&node.instance()).unwrap();
        assert_eq!(atom.subscriber_count(), 1);

        node_ref.detach().unwrap();
        assert_eq!(atom.subscriber_count(), 0);
        count.set_value(5).unwrap();
        assert_eq!(node.text_content(), "");
    }

    #[test]
    fn unknown_renderers_propagate() {
        let (atom, count) = atom_signal(0);
        let (_fallbacks, fallback) = counting_fallback();
        let node_ref = text_binder(&count, fallback);
        let foreign = Instance::new(RendererTag::new("native"), Arc::new(()));

        assert!(matches!(
            node_ref.attach(&foreign),
            Err(Error::RendererMismatch { .. })
        ));
        assert_eq!(atom.subscriber_count(), 0);
    }

    #[test]
    fn prop_changes_patch_only_their_key() {
        let (_atom, width) = atom_signal(10);
        let mut style = Props::new();
        style.insert("width".into(), Value::from(width.clone()));
        style.insert("color".into(), Value::from("red"));
        let mut props = Props::new();
        props.insert("style".into(), Value::map(style));
        let mut prop_signals = IndexMap::new();
        prop_signals.insert("style".to_string(), vec![width.clone()]);

        let (_fallbacks, fallback) = counting_fallback();
        let node_ref = InstanceBinder::new(
            Arc::new(Renderers::headless()),
            Vec::new().into(),
            Vec::new(),
            props,
            prop_signals,
            fallback,
        )
        .into_node_ref();
        let node = Arc::new(DomNode::new("div"));

        node_ref.attach(&node.instance()).unwrap();
        width.set_value(20).unwrap();

        assert_eq!(node.style("width").as_deref(), Some("20px"));
        assert_eq!(node.style("color").as_deref(), Some("red"));
    }

    #[test]
    fn changes_before_mount_are_caught_up() {
        let (_atom, count) = atom_signal(0);
        let (_fallbacks, fallback) = counting_fallback();
        let children: Arc<[Value]> = vec![Value::from(count.clone())].into();
        let mut readings = Readings::new();
        readings.insert(count.clone(), Some(Value::from(0)));
        let node_ref = InstanceBinder::new(
            Arc::new(Renderers::headless()),
            children,
            vec![count.clone()],
            Props::new(),
            IndexMap::new(),
            fallback,
        )
        .with_readings(readings)
        .into_node_ref();

        count.set_value(3).unwrap();
        let node = Arc::new(DomNode::new("span"));
        node_ref.attach(&node.instance()).unwrap();

        assert_eq!(node.text_content(), "3");
    }

    #[test]
    fn user_refs_run_after_the_binder() {
        let (_atom, count) = atom_signal(0);
        let (_fallbacks, fallback) = counting_fallback();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let user_ref = NodeRef::new(move |instance| {
            if instance.is_some() {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

        let node_ref = InstanceBinder::new(
            Arc::new(Renderers::headless()),
            vec![Value::from(count.clone())].into(),
            vec![count],
            Props::new(),
            IndexMap::new(),
            fallback,
        )
        .with_user_ref(Some(user_ref))
        .into_node_ref();

        let node = Arc::new(DomNode::new("span"));
        node_ref.attach(&node.instance()).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    fn prop_binder(key: &str, signal: &Signal, fallback: Callable) -> InstanceBinder {
        let mut props = Props::new();
        props.insert(key.to_string(), Value::from(signal.clone()));
        let mut prop_signals = IndexMap::new();
        prop_signals.insert(key.to_string(), vec![signal.clone()]);
        InstanceBinder::new(
            Arc::new(Renderers::headless()),
            Vec::new().into(),
            Vec::new(),
            props,
            prop_signals,
            fallback,
        )
    }

    #[test]
    fn adapter_rejections_fall_back() {
        let mut style = Props::new();
        style.insert("width".into(), Value::from(10));
        let (_atom, look) = atom_signal(Value::map(style));
        let (fallbacks, fallback) = counting_fallback();
        let node_ref = prop_binder("style", &look, fallback).into_node_ref();
        let node = Arc::new(DomNode::new("div"));

        node_ref.attach(&node.instance()).unwrap();
        assert_eq!(fallbacks.load(Ordering::SeqCst), 0);

        // a bare number is not a style map
        look.set_value(5).unwrap();
        assert_eq!(fallbacks.load(Ordering::SeqCst), 1);
        assert_eq!(node.style("width"), None);
    }

    #[test]
    fn method_readings_are_not_caught_up() {
        let mut object = Props::new();
        object.insert(
            "handle".into(),
            Value::Function(Callable::from_fn(|_| Ok(Value::Null))),
        );
        let (_atom, base) = atom_signal(Value::map(object));
        let handler = base.field("handle");
        let (fallbacks, fallback) = counting_fallback();

        let mut readings = Readings::new();
        readings.insert(handler.clone(), Some(handler.read().unwrap()));
        let node_ref = prop_binder("onClick", &handler, fallback)
            .with_readings(readings)
            .into_node_ref();
        let node = Arc::new(DomNode::new("button"));

        node_ref.attach(&node.instance()).unwrap();
        assert!(node.property("onClick").is_none());
        assert_eq!(fallbacks.load(Ordering::SeqCst), 0);
    }
}
