//! Headless scene-graph target.
//!
//! A `SceneObject` has fixed-size numeric vectors (position, scale, color,
//! ...) that are updated in place, plus free-form fields. `SceneAdapter`
//! writes an array onto a vector component-wise and broadcasts a scalar to
//! every component; any key that is not a vector is assigned.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::{Instance, PropsAdapter, RendererTag};
use crate::error::AdapterError;
use crate::value::{Props, Value};

type Components = SmallVec<[f64; 4]>;

#[derive(Debug, Default)]
struct SceneState {
    vectors: IndexMap<String, Components>,
    fields: Props,
}

/// An in-memory scene object.
#[derive(Debug)]
pub struct SceneObject {
    name: String,
    state: Mutex<SceneState>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(SceneState::default()),
        }
    }

    /// Declare a numeric vector property with its initial components.
    pub fn with_vector(self, key: impl Into<String>, components: &[f64]) -> Self {
        self.state
            .lock()
            .vectors
            .insert(key.into(), components.iter().copied().collect());
        self
    }

    pub fn instance(self: &Arc<Self>) -> Instance {
        Instance::new(RendererTag::SCENE, Arc::clone(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vector(&self, key: &str) -> Option<Vec<f64>> {
        self.state.lock().vectors.get(key).map(|v| v.to_vec())
    }

    pub fn field(&self, key: &str) -> Option<Value> {
        self.state.lock().fields.get(key).cloned()
    }
}

/// Applies props to [`SceneObject`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneAdapter;

impl PropsAdapter for SceneAdapter {
    fn apply_props(&self, instance: &Instance, props: &Props) -> Result<(), AdapterError> {
        let object = instance
            .downcast::<SceneObject>()
            .ok_or(AdapterError::TargetMismatch {
                expected: "SceneObject",
            })?;

        let mut guard = object.state.lock();
        let state = &mut *guard;
        for (key, value) in props {
            match state.vectors.get_mut(key) {
                Some(vector) => write_vector(key, vector, value)?,
                None => {
                    state.fields.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}

fn write_vector(key: &str, vector: &mut Components, value: &Value) -> Result<(), AdapterError> {
    match value {
        Value::Number(n) => {
            vector.iter_mut().for_each(|c| *c = *n);
            Ok(())
        }
        Value::Array(items) => {
            if items.len() != vector.len() {
                return Err(AdapterError::unsupported(
                    key,
                    format!("expected {} components, got {}", vector.len(), items.len()),
                ));
            }
            let components = items
                .iter()
                .map(Value::as_f64)
                .collect::<Option<Components>>()
                .ok_or_else(|| AdapterError::unsupported(key, "components must be numbers"))?;
            *vector = components;
            Ok(())
        }
        _ => Err(AdapterError::unsupported(key, "expected an array or a number")),
    }
}
