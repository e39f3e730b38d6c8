//! Factory options.
//!
//! Every signal created by one factory shares one `Arc<SignalOptions>`. The
//! options decide how the proxy-shaped accessors behave and how pending
//! readings are handled on the render path.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Pending;
use crate::error::{Error, Result};
use crate::value::Value;

/// Hook turning a pending reading into something renderable.
pub type UnwrapHook = Arc<dyn Fn(&Pending) -> Result<Value> + Send + Sync>;

/// What a read does when the current value is still pending.
///
/// There is no default: every factory has to pick one.
#[derive(Clone)]
pub enum PendingPolicy {
    /// Hand the raw pending value to the render path.
    PassThrough,
    /// Fail the read with [`Error::Pending`].
    Reject,
    /// Delegate to a caller-supplied hook.
    Unwrap(UnwrapHook),
}

impl PendingPolicy {
    pub fn unwrap_with<F>(hook: F) -> Self
    where
        F: Fn(&Pending) -> Result<Value> + Send + Sync + 'static,
    {
        PendingPolicy::Unwrap(Arc::new(hook))
    }

    /// Use the resolved value, failing while unresolved.
    pub fn resolved() -> Self {
        Self::unwrap_with(|pending| pending.peek().ok_or(Error::Pending))
    }

    pub(crate) fn apply(&self, value: Value) -> Result<Value> {
        let Value::Pending(pending) = &value else {
            return Ok(value);
        };
        match self {
            PendingPolicy::PassThrough => Ok(value),
            PendingPolicy::Reject => Err(Error::Pending),
            PendingPolicy::Unwrap(hook) => hook(pending),
        }
    }
}

impl fmt::Debug for PendingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingPolicy::PassThrough => f.write_str("PassThrough"),
            PendingPolicy::Reject => f.write_str("Reject"),
            PendingPolicy::Unwrap(_) => f.write_str("Unwrap(..)"),
        }
    }
}

/// Options shared by all signals of one factory.
#[derive(Debug, Clone)]
pub struct SignalOptions {
    /// Accessing a non-value name derives a nested signal (otherwise it reads
    /// an attribute stored on the handle).
    pub recursive: bool,
    /// Name whose access reads the current value eagerly.
    pub value_accessor: Option<String>,
    /// Name that derives the path segment named like `value_accessor`.
    pub fallback_value_accessor: Option<String>,
    pub pending: PendingPolicy,
}

impl SignalOptions {
    pub fn new(pending: PendingPolicy) -> Self {
        Self {
            recursive: false,
            value_accessor: None,
            fallback_value_accessor: None,
            pending,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn value_accessor(mut self, name: impl Into<String>) -> Self {
        self.value_accessor = Some(name.into());
        self
    }

    pub fn fallback_value_accessor(mut self, name: impl Into<String>) -> Self {
        self.fallback_value_accessor = Some(name.into());
        self
    }

    pub fn is_value_accessor(&self, name: &str) -> bool {
        self.value_accessor.as_deref() == Some(name)
    }

    /// Map an accessed name to the path segment it addresses.
    pub fn resolve_key<'a>(&'a self, name: &'a str) -> &'a str {
        match (&self.value_accessor, &self.fallback_value_accessor) {
            (Some(value), Some(fallback)) if fallback == name => value,
            _ => name,
        }
    }
}

// ----------------------------------------------------------------------------
// Serializable configuration
// ----------------------------------------------------------------------------

/// Configuration-file form of [`PendingPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingMode {
    PassThrough,
    Reject,
    Resolved,
}

impl From<PendingMode> for PendingPolicy {
    fn from(mode: PendingMode) -> Self {
        match mode {
            PendingMode::PassThrough => PendingPolicy::PassThrough,
            PendingMode::Reject => PendingPolicy::Reject,
            PendingMode::Resolved => PendingPolicy::resolved(),
        }
    }
}

/// Factory configuration as read from a file.
///
/// `pending` has no default and must be spelled out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalsConfig {
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub value_accessor: Option<String>,
    #[serde(default)]
    pub fallback_value_accessor: Option<String>,
    pub pending: PendingMode,
}

impl SignalsConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_options(self) -> SignalOptions {
        SignalOptions {
            recursive: self.recursive,
            value_accessor: self.value_accessor,
            fallback_value_accessor: self.fallback_value_accessor,
            pending: self.pending.into(),
        }
    }
}
