//! Rerender Boundary
//!
//! A minimal component that owns a list of signals, subscribes to them once
//! committed and re-renders itself (never its parent) whenever one fires.
//! All content comes from the render callback it receives as a prop.
//!
//! # Props
//!
//! - `signals`: array of the implicated signals.
//! - `uncontrolled`: initial mode, read on the first render only. An
//!   uncontrolled boundary tracks nothing; it hands the render callback a
//!   fallback that switches it to controlled mode for good.
//! - `render`: callable receiving the fallback (or `null`) and returning the
//!   element to show.
//!
//! # Subscription stability
//!
//! The tracked list is only replaced when the candidate differs by length or
//! by identity at some position, so a parent re-rendering with the same
//! signals does not resubscribe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::signal::{Signal, SubscriptionSet};
use crate::tree::{Component, Element, MountedComponent, RerenderHandle};
use crate::value::{Callable, Props, Value};

/// Component name as reported to the host.
pub const BOUNDARY_NAME: &str = "SignalsRerenderer";

/// The boundary component type.
#[derive(Debug, Default)]
pub struct RerenderBoundary;

impl RerenderBoundary {
    pub fn new() -> Self {
        Self
    }
}

impl Component for RerenderBoundary {
    fn name(&self) -> &str {
        BOUNDARY_NAME
    }

    fn mount(&self, rerender: RerenderHandle) -> Box<dyn MountedComponent> {
        Box::new(MountedBoundary {
            rerender,
            uncontrolled: Arc::new(AtomicBool::new(false)),
            rendered: false,
            signals: SignalList::default(),
            resubscribe: false,
            subscriptions: SubscriptionSet::new(),
            snapshot: Vec::new(),
        })
    }
}

/// Parsed boundary props.
pub struct BoundaryProps {
    pub signals: Vec<Signal>,
    pub uncontrolled: bool,
    pub render: Callable,
}

impl BoundaryProps {
    pub fn to_props(&self) -> Props {
        let mut props = Props::with_capacity(3);
        props.insert("uncontrolled".to_string(), Value::Bool(self.uncontrolled));
        props.insert(
            "signals".to_string(),
            Value::array(self.signals.iter().cloned().map(Value::Signal).collect()),
        );
        props.insert("render".to_string(), Value::Function(self.render.clone()));
        props
    }

    pub fn from_props(props: &Props) -> Result<Self> {
        let signals = match props.get("signals") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_signal().cloned())
                .collect::<Option<Vec<_>>>()
                .ok_or(Error::BoundaryProps("`signals` may only hold signals"))?,
            None | Some(Value::Null) => Vec::new(),
            Some(_) => return Err(Error::BoundaryProps("`signals` must be an array")),
        };
        let uncontrolled = match props.get("uncontrolled") {
            Some(Value::Bool(b)) => *b,
            None | Some(Value::Null) => false,
            Some(_) => return Err(Error::BoundaryProps("`uncontrolled` must be a boolean")),
        };
        let render = match props.get("render") {
            Some(Value::Function(render)) => render.clone(),
            _ => return Err(Error::BoundaryProps("`render` must be callable")),
        };
        Ok(Self {
            signals,
            uncontrolled,
            render,
        })
    }
}

/// A signal list that keeps its identity while its contents do not change.
#[derive(Debug)]
pub struct SignalList {
    signals: Arc<[Signal]>,
}

impl Default for SignalList {
    fn default() -> Self {
        Self {
            signals: Arc::from(Vec::new()),
        }
    }
}

impl SignalList {
    /// Adopt `candidate` (deduplicated) if it differs; returns whether it did.
    pub fn adopt(&mut self, candidate: Vec<Signal>) -> bool {
        let candidate: IndexSet<Signal> = candidate.into_iter().collect();
        let unchanged = candidate.len() == self.signals.len()
            && candidate
                .iter()
                .zip(self.signals.iter())
                .all(|(a, b)| a.ptr_eq(b));
        if unchanged {
            return false;
        }
        self.signals = candidate.into_iter().collect();
        true
    }

    pub fn signals(&self) -> &Arc<[Signal]> {
        &self.signals
    }
}

struct MountedBoundary {
    rerender: RerenderHandle,
    uncontrolled: Arc<AtomicBool>,
    rendered: bool,
    signals: SignalList,
    resubscribe: bool,
    subscriptions: SubscriptionSet,
    /// Readings taken at the last render, parallel to `signals`.
    snapshot: Vec<Option<Value>>,
}

impl MountedBoundary {
    fn fallback(&self) -> Callable {
        let uncontrolled = Arc::clone(&self.uncontrolled);
        let rerender = Arc::clone(&self.rerender);
        Callable::from_fn(move |_| {
            if uncontrolled.swap(false, Ordering::SeqCst) {
                debug!("boundary promoted to controlled mode");
                rerender();
            }
            Ok(Value::Null)
        })
    }

    fn subscribe_all(&mut self) {
        self.subscriptions.drain();
        for signal in self.signals.signals().iter() {
            let rerender = Arc::clone(&self.rerender);
            self.subscriptions.push(signal.subscribe(move || rerender()));
        }
        debug!(signals = self.subscriptions.len(), "boundary subscribed");
    }

    fn changed_since_render(&self) -> bool {
        self.signals
            .signals()
            .iter()
            .zip(&self.snapshot)
            .any(|(signal, recorded)| match (recorded, signal.read().ok()) {
                (Some(before), Some(now)) => reading_moved(before, &now),
                (None, None) => false,
                _ => true,
            })
    }
}

/// Whether a reading changed since it was recorded.
///
/// Bound methods are rebuilt on every read, so two invocable readings
/// count as unchanged.
pub(crate) fn reading_moved(before: &Value, now: &Value) -> bool {
    if before.is_invocable() && now.is_invocable() {
        return false;
    }
    !before.same(now)
}

impl MountedComponent for MountedBoundary {
    fn render(&mut self, props: &Props) -> Result<Element> {
        let props = BoundaryProps::from_props(props)?;
        if !self.rendered {
            self.uncontrolled.store(props.uncontrolled, Ordering::SeqCst);
            self.rendered = true;
        }

        let uncontrolled = self.uncontrolled.load(Ordering::SeqCst);
        let candidate = if uncontrolled { Vec::new() } else { props.signals };
        if self.signals.adopt(candidate) {
            self.resubscribe = true;
        }

        let fallback = if uncontrolled {
            Value::Function(self.fallback())
        } else {
            Value::Null
        };
        trace!(uncontrolled, signals = self.signals.signals().len(), "boundary render");

        let element = match props.render.call(&[fallback])? {
            Value::Element(element) => element,
            _ => return Err(Error::BoundaryProps("`render` must return an element")),
        };

        self.snapshot = self
            .signals
            .signals()
            .iter()
            .map(|signal| signal.read().ok())
            .collect();
        Ok(element)
    }

    fn committed(&mut self) -> Result<()> {
        if !self.resubscribe {
            return Ok(());
        }
        self.resubscribe = false;
        self.subscribe_all();

        if self.changed_since_render() {
            debug!("signal changed between render and subscribe, rerendering");
            (self.rerender)();
        }
        Ok(())
    }

    fn unmount(&mut self) {
        self.subscriptions.drain();
    }
}
