//! Headless DOM target.
//!
//! `DomNode` keeps the three things a patch can touch: text content, element
//! properties and inline style. `DomAdapter` writes partial props onto it
//! with browser semantics:
//!
//! - `children` replaces the text content.
//! - `style` takes a map or an array of maps (merged left to right).
//! - Anything else is assigned as a property.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::{Instance, PropsAdapter, RendererTag};
use crate::error::AdapterError;
use crate::value::{format_number, Props, Value};

/// Style properties that take plain numbers.
const UNITLESS: &[&str] = &[
    "animationIterationCount",
    "aspectRatio",
    "borderImageOutset",
    "borderImageSlice",
    "borderImageWidth",
    "boxFlex",
    "boxFlexGroup",
    "boxOrdinalGroup",
    "columnCount",
    "columns",
    "flex",
    "flexGrow",
    "flexPositive",
    "flexShrink",
    "flexNegative",
    "flexOrder",
    "gridArea",
    "gridRow",
    "gridRowEnd",
    "gridRowSpan",
    "gridRowStart",
    "gridColumn",
    "gridColumnEnd",
    "gridColumnSpan",
    "gridColumnStart",
    "fontWeight",
    "lineClamp",
    "lineHeight",
    "opacity",
    "order",
    "orphans",
    "scale",
    "tabSize",
    "widows",
    "zIndex",
    "zoom",
    "fillOpacity",
    "floodOpacity",
    "stopOpacity",
    "strokeDasharray",
    "strokeDashoffset",
    "strokeMiterlimit",
    "strokeOpacity",
    "strokeWidth",
];

#[derive(Debug, Default)]
struct DomState {
    text_content: String,
    properties: Props,
    style: IndexMap<String, String>,
}

/// An in-memory element.
#[derive(Debug)]
pub struct DomNode {
    tag: String,
    state: Mutex<DomState>,
}

impl DomNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            state: Mutex::new(DomState::default()),
        }
    }

    /// Wrap a fresh node into an instance tagged for the DOM renderer.
    pub fn instance(self: &Arc<Self>) -> Instance {
        Instance::new(RendererTag::DOM, Arc::clone(self))
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn text_content(&self) -> String {
        self.state.lock().text_content.clone()
    }

    pub fn set_text_content(&self, text: impl Into<String>) {
        self.state.lock().text_content = text.into();
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.state.lock().properties.get(name).cloned()
    }

    pub fn set_property(&self, name: impl Into<String>, value: Value) {
        self.state.lock().properties.insert(name.into(), value);
    }

    pub fn style(&self, name: &str) -> Option<String> {
        self.state.lock().style.get(name).cloned()
    }

    /// Set one inline style declaration; an empty value removes it.
    pub fn set_style(&self, name: impl Into<String>, value: String) {
        let name = name.into();
        let mut state = self.state.lock();
        if value.is_empty() {
            state.style.shift_remove(&name);
        } else {
            state.style.insert(name, value);
        }
    }
}

/// Applies props to [`DomNode`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomAdapter;

impl PropsAdapter for DomAdapter {
    fn apply_props(&self, instance: &Instance, props: &Props) -> Result<(), AdapterError> {
        let node = instance
            .downcast::<DomNode>()
            .ok_or(AdapterError::TargetMismatch { expected: "DomNode" })?;

        for (key, value) in props {
            match key.as_str() {
                "children" => node.set_text_content(text_content(value)?),
                "style" => apply_styles(node, &merge_styles(value)?)?,
                _ => node.set_property(key.clone(), value.clone()),
            }
        }
        Ok(())
    }
}

fn text_content(value: &Value) -> Result<String, AdapterError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(_) | Value::Number(_) => Ok(value.to_text()),
        _ => Err(AdapterError::unsupported("children", "text content must be a string or number")),
    }
}

fn merge_styles(value: &Value) -> Result<Props, AdapterError> {
    match value {
        Value::Null => Ok(Props::new()),
        Value::Map(map) => Ok((**map).clone()),
        Value::Array(items) => {
            let mut merged = Props::new();
            for item in items.iter() {
                match item {
                    Value::Map(map) => {
                        merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                    Value::Null | Value::Bool(false) => {}
                    _ => return Err(AdapterError::unsupported("style", "expected a style map")),
                }
            }
            Ok(merged)
        }
        _ => Err(AdapterError::unsupported("style", "expected a map or an array of maps")),
    }
}

fn apply_styles(node: &DomNode, styles: &Props) -> Result<(), AdapterError> {
    for (name, value) in styles {
        let custom = name.starts_with("--");
        let css = style_value(name, value, custom)?;
        if name == "float" {
            node.set_style("cssFloat", css);
        } else {
            node.set_style(name.clone(), css);
        }
    }
    Ok(())
}

fn style_value(name: &str, value: &Value, custom: bool) -> Result<String, AdapterError> {
    match value {
        Value::Null | Value::Bool(_) => Ok(String::new()),
        Value::Number(n) if !custom && *n != 0.0 && !UNITLESS.contains(&name) => {
            Ok(format!("{}px", format_number(*n)))
        }
        Value::Number(n) => Ok(format_number(*n)),
        Value::String(s) => Ok(s.trim().to_string()),
        _ => Err(AdapterError::unsupported(name, "style values must be scalars")),
    }
}
