//! Usage Classifier
//!
//! Decides, per tree-building call, which signals a node depends on and how
//! it will be kept up to date.

use indexmap::{IndexMap, IndexSet};

use crate::signal::Signal;
use crate::tree::{find_all_signals, ElementType};
use crate::value::{Props, Value};

/// Update strategy for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// No signals: build the node as-is.
    PassThrough,
    /// Build once and patch the mounted instance on change.
    DirectPatch,
    /// Re-run the building primitive inside a boundary on change.
    Rerender,
}

/// The signals a node depends on and the strategy chosen for it.
#[derive(Debug, Clone)]
pub struct Usage {
    pub children_signals: Vec<Signal>,
    /// Signals found under each prop key, in prop insertion order.
    pub prop_signals: IndexMap<String, Vec<Signal>>,
    pub strategy: Strategy,
}

impl Usage {
    pub fn classify(ty: &ElementType, props: &Props, children: &[Value]) -> Self {
        let mut children_signals = IndexSet::new();
        for child in children {
            children_signals.extend(find_all_signals(child));
        }

        let prop_signals: IndexMap<String, Vec<Signal>> = props
            .iter()
            .filter_map(|(key, value)| {
                let found = find_all_signals(value);
                (!found.is_empty()).then(|| (key.clone(), found))
            })
            .collect();

        let strategy = if children_signals.is_empty() && prop_signals.is_empty() {
            Strategy::PassThrough
        } else if ty.is_host() && children.iter().all(is_patchable_child) {
            Strategy::DirectPatch
        } else {
            Strategy::Rerender
        };

        Self {
            children_signals: children_signals.into_iter().collect(),
            prop_signals,
            strategy,
        }
    }

    /// Every implicated signal once: children first, then props in order.
    pub fn all_signals(&self) -> Vec<Signal> {
        let mut all: IndexSet<Signal> = self.children_signals.iter().cloned().collect();
        for signals in self.prop_signals.values() {
            all.extend(signals.iter().cloned());
        }
        all.into_iter().collect()
    }
}

fn is_patchable_child(child: &Value) -> bool {
    match child {
        Value::String(_) | Value::Number(_) => true,
        Value::Signal(signal) => is_displayable_signal(signal),
        _ => false,
    }
}

/// Probe the current reading. This only guesses from the value right now;
/// a read error counts as not displayable.
pub fn is_displayable_signal(signal: &Signal) -> bool {
    signal
        .read()
        .map(|value| value.is_displayable())
        .unwrap_or(false)
}
