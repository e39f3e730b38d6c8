//! Tree Walker
//!
//! Deep traversal over props and children: find every reachable signal,
//! replace signals with their readings, or drop them.
//!
//! Only arrays and maps are descended into. Elements are black boxes and
//! every other value is a leaf. Containers are visited once per call, keyed
//! by identity, so a subtree shared between several parents is processed
//! once and comes out as one shared result.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexSet;

use crate::error::Result;
use crate::signal::Signal;
use crate::value::{Props, Value};

fn container_addr(value: &Value) -> Option<usize> {
    match value {
        Value::Array(items) => Some(Arc::as_ptr(items) as *const () as usize),
        Value::Map(map) => Some(Arc::as_ptr(map) as *const () as usize),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Find
// ----------------------------------------------------------------------------

/// Every signal reachable from `value`, each exactly once, in discovery order.
pub fn find_all_signals(value: &Value) -> Vec<Signal> {
    let mut visited = HashSet::new();
    let mut found = IndexSet::new();
    collect(value, &mut visited, &mut found);
    found.into_iter().collect()
}

fn collect(value: &Value, visited: &mut HashSet<usize>, found: &mut IndexSet<Signal>) {
    if let Value::Signal(signal) = value {
        found.insert(signal.clone());
        return;
    }
    let Some(addr) = container_addr(value) else {
        return;
    };
    if !visited.insert(addr) {
        return;
    }
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect(item, visited, found)),
        Value::Map(map) => map.values().for_each(|item| collect(item, visited, found)),
        _ => {}
    }
}

// ----------------------------------------------------------------------------
// Fill
// ----------------------------------------------------------------------------

/// Replace every reachable signal with its current reading.
///
/// Subtrees without signals come back as the identical reference. The first
/// failing read aborts the whole fill.
pub fn fill_all_signal_values(value: &Value) -> Result<Value> {
    Filler::default().fill(value)
}

#[derive(Default)]
struct Filler {
    containers: HashMap<usize, Value>,
    readings: HashMap<Signal, Value>,
}

impl Filler {
    fn fill(&mut self, value: &Value) -> Result<Value> {
        if let Value::Signal(signal) = value {
            if let Some(reading) = self.readings.get(signal) {
                return Ok(reading.clone());
            }
            let reading = signal.read()?;
            self.readings.insert(signal.clone(), reading.clone());
            return Ok(reading);
        }

        let Some(addr) = container_addr(value) else {
            return Ok(value.clone());
        };
        if let Some(done) = self.containers.get(&addr) {
            return Ok(done.clone());
        }

        let filled = match value {
            Value::Array(items) => {
                let mut changed = false;
                let mut next = Vec::with_capacity(items.len());
                for item in items.iter() {
                    let item_filled = self.fill(item)?;
                    changed |= !item_filled.same(item);
                    next.push(item_filled);
                }
                if changed {
                    Value::array(next)
                } else {
                    value.clone()
                }
            }
            Value::Map(map) => {
                let mut changed = false;
                let mut next = Props::with_capacity(map.len());
                for (key, item) in map.iter() {
                    let item_filled = self.fill(item)?;
                    changed |= !item_filled.same(item);
                    next.insert(key.clone(), item_filled);
                }
                if changed {
                    Value::map(next)
                } else {
                    value.clone()
                }
            }
            _ => value.clone(),
        };

        self.containers.insert(addr, filled.clone());
        Ok(filled)
    }
}

// ----------------------------------------------------------------------------
// Remove
// ----------------------------------------------------------------------------

/// Drop every reachable signal.
///
/// A signal held by a map drops its key; one held by an array drops its
/// entry. Returns `None` when `value` itself is a signal.
pub fn remove_all_signals(value: &Value) -> Option<Value> {
    Remover::new(|_: &Signal| true).remove(value)
}

/// Drop only the signals in `targets`.
pub fn remove_signals(value: &Value, targets: &[Signal]) -> Option<Value> {
    Remover::new(|signal: &Signal| targets.contains(signal)).remove(value)
}

struct Remover<F> {
    is_target: F,
    containers: HashMap<usize, Value>,
}

impl<F: Fn(&Signal) -> bool> Remover<F> {
    fn new(is_target: F) -> Self {
        Self {
            is_target,
            containers: HashMap::new(),
        }
    }

    fn remove(&mut self, value: &Value) -> Option<Value> {
        if let Value::Signal(signal) = value {
            return if (self.is_target)(signal) {
                None
            } else {
                Some(value.clone())
            };
        }

        let Some(addr) = container_addr(value) else {
            return Some(value.clone());
        };
        if let Some(done) = self.containers.get(&addr) {
            return Some(done.clone());
        }

        let stripped = match value {
            Value::Array(items) => {
                let mut changed = false;
                let mut next = Vec::with_capacity(items.len());
                for item in items.iter() {
                    match self.remove(item) {
                        Some(kept) => {
                            changed |= !kept.same(item);
                            next.push(kept);
                        }
                        None => changed = true,
                    }
                }
                if changed {
                    Value::array(next)
                } else {
                    value.clone()
                }
            }
            Value::Map(map) => {
                let mut changed = false;
                let mut next = Props::with_capacity(map.len());
                for (key, item) in map.iter() {
                    match self.remove(item) {
                        Some(kept) => {
                            changed |= !kept.same(item);
                            next.insert(key.clone(), kept);
                        }
                        None => changed = true,
                    }
                }
                if changed {
                    Value::map(next)
                } else {
                    value.clone()
                }
            }
            _ => value.clone(),
        };

        self.containers.insert(addr, stripped.clone());
        Some(stripped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::signal::{Atom, Pending, PendingPolicy, SignalOptions};
    use crate::tree::{Element, ElementType};

    fn signal(initial: impl Into<Value>) -> Signal {
        let options = Arc::new(SignalOptions::new(PendingPolicy::Reject));
        Signal::wrap(Atom::new(initial).parts(), options)
    }

    fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::map(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )
    }

    #[test]
    fn find_returns_each_signal_once() {
        let s1 = signal(1);
        let s2 = signal(2);
        let tree = map(vec![
            ("a", Value::from(s1.clone())),
            ("b", Value::array(vec![Value::from(s2.clone()), Value::from("text")])),
            ("c", map(vec![("d", Value::from(s1.clone()))])),
        ]);

        let found = find_all_signals(&tree);
        assert_eq!(found, vec![s1, s2]);
    }

    #[test]
    fn find_visits_shared_subtrees_once() {
        let s1 = signal(1);
        let shared = Value::array(vec![Value::from(s1.clone())]);
        let tree = Value::array(vec![shared.clone(), shared]);

        assert_eq!(find_all_signals(&tree), vec![s1]);
    }

    #[test]
    fn find_does_not_descend_into_elements() {
        let mut props = Props::new();
        props.insert("title".into(), Value::from(signal("hidden")));
        let element = Element::new(ElementType::host("span"), props, Vec::new());

        let tree = Value::array(vec![Value::from(element)]);
        assert!(find_all_signals(&tree).is_empty());
    }

    #[test]
    fn fill_without_signals_returns_the_same_reference() {
        let tree = Value::from(serde_json::json!({ "a": [1, 2], "b": { "c": "x" } }));
        let filled = fill_all_signal_values(&tree).unwrap();
        assert!(filled.same(&tree));
    }

    #[test]
    fn fill_rebuilds_only_the_path_to_a_signal() {
        let sibling = Value::from(serde_json::json!({ "untouched": true }));
        let middle = map(vec![("leaf", Value::from(signal(7)))]);
        let tree = map(vec![("middle", middle.clone()), ("sibling", sibling.clone())]);

        let filled = fill_all_signal_values(&tree).unwrap();

        assert!(!filled.same(&tree));
        let filled_middle = filled.get_field("middle").unwrap();
        assert!(!filled_middle.same(&middle));
        assert_eq!(filled_middle.get_field("leaf").unwrap().as_f64(), Some(7.0));
        assert!(filled.get_field("sibling").unwrap().same(&sibling));
    }

    #[test]
    fn fill_shares_results_for_shared_subtrees() {
        let shared = Value::array(vec![Value::from(signal("x"))]);
        let tree = Value::array(vec![shared.clone(), shared]);

        let filled = fill_all_signal_values(&tree).unwrap();
        let items = filled.as_array().unwrap();
        assert!(items[0].same(&items[1]));
        assert_eq!(items[0].to_text(), "x");
    }

    #[test]
    fn fill_propagates_read_failures() {
        let (_resolver, pending) = Pending::channel();
        let tree = Value::array(vec![Value::from(signal(Value::Pending(pending)))]);

        assert!(matches!(fill_all_signal_values(&tree), Err(Error::Pending)));
    }

    #[test]
    fn remove_drops_map_keys_and_array_entries() {
        let s1 = signal(1);
        let tree = map(vec![
            ("a", Value::from(s1.clone())),
            ("b", Value::array(vec![Value::from(s1), Value::from("text")])),
            ("c", Value::from(3)),
        ]);

        let stripped = remove_all_signals(&tree).unwrap();
        let props = stripped.as_map().unwrap();
        assert!(!props.contains_key("a"));
        assert_eq!(props["b"].as_array().map(<[Value]>::len), Some(1));
        assert_eq!(props["c"].as_f64(), Some(3.0));
    }

    #[test]
    fn remove_without_signals_returns_the_same_reference() {
        let tree = Value::from(serde_json::json!({ "a": [1, 2] }));
        assert!(remove_all_signals(&tree).unwrap().same(&tree));
        assert!(remove_all_signals(&Value::from(signal(0))).is_none());
    }

    #[test]
    fn remove_signals_keeps_signals_outside_the_subset() {
        let dropped = signal(1);
        let kept = signal(2);
        let tree = map(vec![
            ("dropped", Value::from(dropped.clone())),
            ("kept", Value::from(kept.clone())),
        ]);

        let stripped = remove_signals(&tree, &[dropped]).unwrap();
        assert_eq!(find_all_signals(&stripped), vec![kept]);
        assert!(!stripped.as_map().unwrap().contains_key("dropped"));
    }
}
