//! A tiny host runtime for driving intercepted trees in tests.
//!
//! `MiniHost` mounts elements onto headless `DomNode`s, calls ref callbacks,
//! drives component lifecycles and queues rerender requests until `flush`.
//! Host writes go straight to the DOM adapter, so a recording adapter in the
//! registry only sees the patches issued by instance binders.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use graft_core::render::dom::{DomAdapter, DomNode};
use graft_core::tree::REF_PROP;
use graft_core::{
    Atom, Component, Element, ElementBuilder, ElementType, Instance, Key, MountedComponent,
    PropsAdapter, RendererTag, Renderers, RerenderHandle, Result, SignalOptions, SignalParts,
    Signals, TreeBuilder, Value,
};
use graft_core::{create_signals, AdapterError, Props};
use indexmap::IndexMap;
use parking_lot::Mutex;

const MAX_FLUSH_ROUNDS: usize = 64;

// ----------------------------------------------------------------------------
// Stores and factories
// ----------------------------------------------------------------------------

/// Cache key carrying a store's initial value.
pub struct Initial(pub Value);

/// Bookkeeping for every atom a test factory created.
#[derive(Clone, Default)]
pub struct Stores {
    atoms: Arc<Mutex<Vec<Arc<Atom>>>>,
    subscribe_calls: Arc<AtomicUsize>,
}

impl Stores {
    /// Listeners currently registered across all atoms.
    pub fn listeners(&self) -> usize {
        self.atoms.lock().iter().map(|atom| atom.subscriber_count()).sum()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    fn parts(&self, initial: Value) -> SignalParts {
        let atom = Atom::new(initial);
        self.atoms.lock().push(Arc::clone(&atom));

        let calls = Arc::clone(&self.subscribe_calls);
        let (subscribe, get, set) = (Arc::clone(&atom), Arc::clone(&atom), atom);
        SignalParts::new(
            move |callback| {
                calls.fetch_add(1, Ordering::SeqCst);
                subscribe.subscribe(callback)
            },
            move || get.get(),
            move |path, value| set.set(path, value),
        )
    }
}

/// A factory over atoms seeded from the last key.
pub fn atom_signals(options: SignalOptions, renderers: Arc<Renderers>) -> (Signals, Stores) {
    let stores = Stores::default();
    let constructor_stores = stores.clone();
    let signals = create_signals(
        move |keys: &[Key]| {
            let initial = keys
                .last()
                .and_then(|key| key.downcast_ref::<Initial>())
                .map(|initial| initial.0.clone())
                .unwrap_or_default();
            constructor_stores.parts(initial)
        },
        options,
        renderers,
    );
    (signals, stores)
}

// ----------------------------------------------------------------------------
// Recording adapter and counting builder
// ----------------------------------------------------------------------------

/// DOM adapter that remembers every patch it was handed.
#[derive(Clone, Default)]
pub struct RecordingAdapter {
    patches: Arc<Mutex<Vec<Props>>>,
    rejected: Option<Arc<str>>,
}

impl RecordingAdapter {
    /// Record patches but refuse every one that touches `key`.
    pub fn rejecting(key: &str) -> Self {
        Self {
            patches: Arc::default(),
            rejected: Some(Arc::from(key)),
        }
    }

    pub fn patches(&self) -> Vec<Props> {
        self.patches.lock().clone()
    }

    /// `children` text of every recorded patch, in order.
    pub fn text_patches(&self) -> Vec<String> {
        self.patches
            .lock()
            .iter()
            .filter_map(|patch| patch.get("children").map(Value::to_text))
            .collect()
    }
}

impl PropsAdapter for RecordingAdapter {
    fn apply_props(&self, instance: &Instance, props: &Props) -> std::result::Result<(), AdapterError> {
        self.patches.lock().push(props.clone());
        if let Some(key) = self.rejected.as_deref().filter(|key| props.contains_key(*key)) {
            return Err(AdapterError::unsupported(key, "rejected by the test adapter"));
        }
        DomAdapter.apply_props(instance, props)
    }
}

pub fn recording_renderers() -> (Arc<Renderers>, RecordingAdapter) {
    renderers_with(RecordingAdapter::default())
}

pub fn renderers_with(recorder: RecordingAdapter) -> (Arc<Renderers>, RecordingAdapter) {
    let renderers = Renderers::builder()
        .register(RendererTag::DOM, recorder.clone())
        .build();
    (Arc::new(renderers), recorder)
}

/// The plain primitive, counting calls per host tag.
#[derive(Clone, Default)]
pub struct CountingBuilder {
    builds: Arc<Mutex<IndexMap<String, usize>>>,
}

impl CountingBuilder {
    pub fn count(&self, tag: &str) -> usize {
        self.builds.lock().get(tag).copied().unwrap_or(0)
    }
}

impl TreeBuilder for CountingBuilder {
    fn build(&self, ty: ElementType, props: Props, children: Vec<Value>) -> Element {
        if let Some(tag) = ty.tag() {
            *self.builds.lock().entry(tag.to_string()).or_default() += 1;
        }
        ElementBuilder.build(ty, props, children)
    }
}

// ----------------------------------------------------------------------------
// Function components
// ----------------------------------------------------------------------------

type RenderFn = dyn Fn(&Props) -> Result<Element> + Send + Sync;

/// A component rendering through a closure.
pub struct FnComponent {
    name: String,
    render: Arc<RenderFn>,
    handles: Mutex<Vec<RerenderHandle>>,
    renders: Arc<AtomicUsize>,
}

impl FnComponent {
    pub fn new<F>(name: &str, render: F) -> Arc<Self>
    where
        F: Fn(&Props) -> Result<Element> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.to_string(),
            render: Arc::new(render),
            handles: Mutex::new(Vec::new()),
            renders: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Request a rerender of every mounted instance.
    pub fn rerender(&self) {
        for handle in self.handles.lock().iter() {
            handle();
        }
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl Component for FnComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn mount(&self, rerender: RerenderHandle) -> Box<dyn MountedComponent> {
        self.handles.lock().push(rerender);
        Box::new(MountedFn {
            render: Arc::clone(&self.render),
            renders: Arc::clone(&self.renders),
        })
    }
}

struct MountedFn {
    render: Arc<RenderFn>,
    renders: Arc<AtomicUsize>,
}

impl MountedComponent for MountedFn {
    fn render(&mut self, props: &Props) -> Result<Element> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        (self.render)(props)
    }
}

// ----------------------------------------------------------------------------
// Host
// ----------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Scheduler {
    next_id: Arc<AtomicU64>,
    queue: Arc<Mutex<Vec<u64>>>,
}

impl Scheduler {
    fn handle(&self) -> (u64, RerenderHandle) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let queue = Arc::clone(&self.queue);
        (id, Arc::new(move || queue.lock().push(id)))
    }
}

struct MountedNode {
    element: Element,
    kind: Kind,
}

enum Kind {
    Host {
        node: Arc<DomNode>,
        instance: Instance,
        children: Vec<MountedNode>,
    },
    Component {
        id: u64,
        instance: Box<dyn MountedComponent>,
        child: Box<MountedNode>,
    },
}

/// A minimal host runtime.
#[derive(Default)]
pub struct MiniHost {
    scheduler: Scheduler,
    root: Option<MountedNode>,
}

impl MiniHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&mut self, element: Element) -> Result<()> {
        let root = mount_node(&self.scheduler, element)?;
        self.root = Some(root);
        Ok(())
    }

    /// Process queued rerenders until none are left; returns how many
    /// component renders ran.
    pub fn flush(&mut self) -> Result<usize> {
        let mut renders = 0;
        for _ in 0..MAX_FLUSH_ROUNDS {
            let mut ids = std::mem::take(&mut *self.scheduler.queue.lock());
            if ids.is_empty() {
                return Ok(renders);
            }
            ids.sort_unstable();
            ids.dedup();
            for id in ids {
                if let Some(root) = self.root.as_mut() {
                    if rerender_component(&self.scheduler, root, id)? {
                        renders += 1;
                    }
                }
            }
        }
        panic!("rerenders did not settle after {MAX_FLUSH_ROUNDS} rounds");
    }

    pub fn pending_rerenders(&self) -> usize {
        self.scheduler.queue.lock().len()
    }

    pub fn unmount_root(&mut self) {
        if let Some(mut root) = self.root.take() {
            unmount_node(&mut root);
        }
    }

    /// The first mounted DOM node with `tag`, depth first.
    pub fn find(&self, tag: &str) -> Option<Arc<DomNode>> {
        self.root.as_ref().and_then(|root| find_node(root, tag))
    }
}

fn child_elements(element: &Element) -> Vec<Element> {
    element
        .children()
        .iter()
        .filter_map(|child| match child {
            Value::Element(child) => Some(child.clone()),
            _ => None,
        })
        .collect()
}

/// Full commit of an element's props and text onto its node.
fn write_host(instance: &Instance, element: &Element) -> Result<()> {
    let mut props: Props = element
        .props()
        .iter()
        .filter(|(key, _)| key.as_str() != REF_PROP)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let texts: Vec<&Value> = element
        .children()
        .iter()
        .filter(|child| !matches!(child, Value::Element(_)))
        .collect();
    if !texts.is_empty() {
        let text: String = texts.iter().map(|child| child.to_text()).collect();
        props.insert("children".to_string(), Value::from(text));
    }

    DomAdapter.apply_props(instance, &props)?;
    Ok(())
}

fn mount_node(scheduler: &Scheduler, element: Element) -> Result<MountedNode> {
    match element.ty().clone() {
        ElementType::Host(tag) => {
            let node = Arc::new(DomNode::new(tag.to_string()));
            let instance = node.instance();
            write_host(&instance, &element)?;

            let children = child_elements(&element)
                .into_iter()
                .map(|child| mount_node(scheduler, child))
                .collect::<Result<Vec<_>>>()?;
            if let Some(node_ref) = element.node_ref() {
                node_ref.attach(&instance)?;
            }
            Ok(MountedNode {
                element,
                kind: Kind::Host {
                    node,
                    instance,
                    children,
                },
            })
        }
        ElementType::Component(component) => {
            let (id, handle) = scheduler.handle();
            let mut instance = component.mount(handle);
            let rendered = instance.render(element.props())?;
            let child = mount_node(scheduler, rendered)?;
            instance.committed()?;
            Ok(MountedNode {
                element,
                kind: Kind::Component {
                    id,
                    instance,
                    child: Box::new(child),
                },
            })
        }
    }
}

fn update_node(scheduler: &Scheduler, mounted: &mut MountedNode, element: Element) -> Result<()> {
    if !mounted.element.ty().same(element.ty()) {
        unmount_node(mounted);
        *mounted = mount_node(scheduler, element)?;
        return Ok(());
    }

    match &mut mounted.kind {
        Kind::Host {
            instance, children, ..
        } => {
            write_host(instance, &element)?;

            let old_ref = mounted.element.node_ref().cloned();
            let new_ref = element.node_ref().cloned();
            let ref_changed = match (&old_ref, &new_ref) {
                (Some(old), Some(new)) => !old.ptr_eq(new),
                (None, None) => false,
                _ => true,
            };
            if ref_changed {
                if let Some(old) = &old_ref {
                    old.detach()?;
                }
            }

            let next = child_elements(&element);
            let keep = next.len();
            for (index, child) in next.into_iter().enumerate() {
                if index < children.len() {
                    update_node(scheduler, &mut children[index], child)?;
                } else {
                    children.push(mount_node(scheduler, child)?);
                }
            }
            while children.len() > keep {
                if let Some(mut extra) = children.pop() {
                    unmount_node(&mut extra);
                }
            }

            if ref_changed {
                if let Some(new) = &new_ref {
                    new.attach(instance)?;
                }
            }
        }
        Kind::Component {
            instance, child, ..
        } => {
            let rendered = instance.render(element.props())?;
            update_node(scheduler, child, rendered)?;
            instance.committed()?;
        }
    }
    mounted.element = element;
    Ok(())
}

fn rerender_component(scheduler: &Scheduler, node: &mut MountedNode, target: u64) -> Result<bool> {
    match &mut node.kind {
        Kind::Component {
            id,
            instance,
            child,
        } => {
            if *id == target {
                let rendered = instance.render(node.element.props())?;
                update_node(scheduler, child, rendered)?;
                instance.committed()?;
                return Ok(true);
            }
            rerender_component(scheduler, child, target)
        }
        Kind::Host { children, .. } => {
            for child in children.iter_mut() {
                if rerender_component(scheduler, child, target)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn unmount_node(node: &mut MountedNode) {
    match &mut node.kind {
        Kind::Host { children, .. } => {
            if let Some(node_ref) = node.element.node_ref() {
                let _ = node_ref.detach();
            }
            for child in children.iter_mut() {
                unmount_node(child);
            }
        }
        Kind::Component {
            instance, child, ..
        } => {
            unmount_node(child);
            instance.unmount();
        }
    }
}

fn find_node(mounted: &MountedNode, tag: &str) -> Option<Arc<DomNode>> {
    match &mounted.kind {
        Kind::Host { node, children, .. } => {
            if node.tag() == tag {
                return Some(Arc::clone(node));
            }
            children.iter().find_map(|child| find_node(child, tag))
        }
        Kind::Component { child, .. } => find_node(child, tag),
    }
}
