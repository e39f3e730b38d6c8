//! Dynamic Values
//!
//! Signals are dynamically typed: a store hands out whatever it holds, and a
//! derived signal narrows that by path. `Value` is the shape everything in
//! this crate agrees on: property bags, children, signal readings and the
//! arguments of invocable values.
//!
//! # Identity
//!
//! Change detection uses [`Value::same`], an identity check rather than deep
//! equality. Scalars and strings compare by content; containers, functions,
//! signals, elements and refs compare by pointer. Stores that want cheap
//! change detection must therefore replace containers along a write path
//! instead of mutating them, which is exactly what [`Value::with_path`] does.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::signal::{Pending, Signal};
use crate::tree::{Element, NodeRef};

/// A single segment of a property path.
pub type PathKey = Arc<str>;

/// A property path relative to a signal's own reference point.
pub type Path = SmallVec<[PathKey; 4]>;

/// An insertion-ordered property bag.
pub type Props = IndexMap<String, Value>;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Map(Arc<Props>),
    Function(Callable),
    Signal(Signal),
    Element(Element),
    Ref(NodeRef),
    Pending(Pending),
}

impl Value {
    /// Build a map value from a property bag.
    pub fn map(props: Props) -> Self {
        Value::Map(Arc::new(props))
    }

    /// Build an array value.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    /// `Object.is`-style identity.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan())
                    || (a == b && a.is_sign_negative() == b.is_sign_negative())
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.same(b),
            (Value::Signal(a), Value::Signal(b)) => a == b,
            (Value::Element(a), Value::Element(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            (Value::Pending(a), Value::Pending(b)) => a.same(b),
            _ => false,
        }
    }

    /// Strings and numbers, the only shapes eligible for direct text patches.
    pub fn is_displayable(&self) -> bool {
        matches!(self, Value::String(_) | Value::Number(_))
    }

    pub fn is_invocable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Value::Pending(_))
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, Value::Signal(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            Value::Signal(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Props> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Read one path segment.
    ///
    /// Maps are read by key and arrays by index (or `length`). Every key of
    /// `Null` fails; other scalars have no fields and yield `Null`.
    pub fn get_field(&self, key: &str) -> Result<Value> {
        match self {
            Value::Null => Err(Error::NullAccess {
                key: key.to_string(),
            }),
            Value::Map(map) => Ok(map.get(key).cloned().unwrap_or_default()),
            Value::Array(items) => {
                if key == "length" {
                    return Ok(Value::Number(items.len() as f64));
                }
                Ok(key
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index))
                    .cloned()
                    .unwrap_or_default())
            }
            Value::String(s) if key == "length" => Ok(Value::Number(s.chars().count() as f64)),
            _ => Ok(Value::Null),
        }
    }

    /// Return a copy with `value` written at `path`.
    ///
    /// Only the containers along the path are rebuilt; every sibling keeps
    /// its identity. Missing or scalar intermediates become maps.
    ///
    /// An array accepts an index inside it or one past its end. Any other
    /// key turns it into a map keyed by the old indices.
    pub fn with_path(&self, path: &[PathKey], value: Value) -> Value {
        let Some((head, rest)) = path.split_first() else {
            return value;
        };

        if let Value::Array(items) = self {
            match head.parse::<usize>() {
                Ok(index) if index < items.len() => {
                    let mut next = (**items).clone();
                    next[index] = next[index].with_path(rest, value);
                    return Value::array(next);
                }
                Ok(index) if index == items.len() => {
                    let mut next = (**items).clone();
                    next.push(Value::Null.with_path(rest, value));
                    return Value::array(next);
                }
                _ => {}
            }
        }

        let mut next = match self {
            Value::Map(map) => (**map).clone(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item.clone()))
                .collect(),
            _ => Props::new(),
        };
        let child = next
            .get(&**head)
            .cloned()
            .unwrap_or_default()
            .with_path(rest, value);
        next.insert(head.to_string(), child);
        Value::map(next)
    }

    /// Render the value the way text children are joined.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(_) => "[object Object]".to_string(),
            Value::Function(_)
            | Value::Signal(_)
            | Value::Element(_)
            | Value::Ref(_)
            | Value::Pending(_) => String::new(),
        }
    }
}

/// Format a number the way text children show it: no trailing `.0` for
/// integral values, exponent form below `1e-6` and from `1e21` up.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let text = format!("{n:e}");
        return match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => text,
        };
    }
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Function(c) => c.fmt(f),
            Value::Signal(s) => s.fmt(f),
            Value::Element(e) => e.fmt(f),
            Value::Ref(r) => r.fmt(f),
            Value::Pending(p) => p.fmt(f),
        }
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<Props> for Value {
    fn from(props: Props) -> Self {
        Value::map(props)
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Value::Function(c)
    }
}

impl From<Signal> for Value {
    fn from(s: Signal) -> Self {
        Value::Signal(s)
    }
}

impl From<Element> for Value {
    fn from(e: Element) -> Self {
        Value::Element(e)
    }
}

impl From<NodeRef> for Value {
    fn from(r: NodeRef) -> Self {
        Value::Ref(r)
    }
}

impl From<Pending> for Value {
    fn from(p: Pending) -> Self {
        Value::Pending(p)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

// ----------------------------------------------------------------------------
// Callables
// ----------------------------------------------------------------------------

type CallFn = dyn Fn(&Value, &[Value]) -> Result<Value> + Send + Sync;

/// An invocable value.
///
/// The function receives its receiver (`Null` unless bound) and arguments.
/// Bound methods share the function and carry the receiver they were read
/// off, so `obj.method` keeps working when called later through a signal.
#[derive(Clone)]
pub struct Callable {
    func: Arc<CallFn>,
    receiver: Option<Arc<Value>>,
}

impl Callable {
    /// Wrap a function taking a receiver and arguments.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            receiver: None,
        }
    }

    /// Wrap a function that ignores its receiver.
    pub fn from_fn<F>(func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(move |_, args| func(args))
    }

    /// Produce a bound method sharing this function.
    pub fn bind(&self, receiver: Value) -> Self {
        Self {
            func: Arc::clone(&self.func),
            receiver: Some(Arc::new(receiver)),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        match &self.receiver {
            Some(receiver) => (self.func)(receiver, args),
            None => (self.func)(&Value::Null, args),
        }
    }

    pub fn same(&self, other: &Callable) -> bool {
        let same_func = std::ptr::addr_eq(Arc::as_ptr(&self.func), Arc::as_ptr(&other.func));
        let same_receiver = match (&self.receiver, &other.receiver) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same(b),
            _ => false,
        };
        same_func && same_receiver
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("bound", &self.receiver.is_some())
            .finish()
    }
}
