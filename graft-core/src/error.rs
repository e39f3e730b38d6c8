//! Error Types
//!
//! Errors fall into three groups:
//!
//! - Configuration errors (`RendererMismatch`, `Config`) are fatal and reach
//!   the embedding application.
//! - Programmer mistakes (`InvalidOperation`, `ReadOnlyProperty`) are raised
//!   synchronously from the offending call.
//! - Patch errors (`Patch`) never leave the instance binder. They are caught
//!   and turned into a promotion to the rerender strategy.

use thiserror::Error;

use crate::render::RendererTag;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by signals, the interceptor and the renderer registry.
#[derive(Debug, Error)]
pub enum Error {
    /// No adapter is registered for the instance's renderer tag.
    #[error("cannot detect renderer type for instance tagged `{tag}`")]
    RendererMismatch { tag: RendererTag },

    /// A write was attempted on a signal that cannot be written.
    #[error("cannot set a value: {reason}")]
    InvalidOperation { reason: &'static str },

    /// A recursive signal only accepts writes through its value accessor.
    #[error("property `{name}` cannot be assigned on a recursive signal")]
    ReadOnlyProperty { name: String },

    /// A path segment was read off `null`.
    #[error("cannot read `{key}` of null")]
    NullAccess { key: String },

    /// A signal was invoked while its current value is not a function.
    #[error("signal value is not callable")]
    NotCallable,

    /// The value is an unresolved pending result and the policy rejects it.
    #[error("signal value is still pending")]
    Pending,

    /// The resolver of a pending value was dropped before resolving it.
    #[error("pending value was abandoned before it resolved")]
    Abandoned,

    /// The factory cache needs at least one key to address an entry.
    #[error("signal cache lookups need at least one key")]
    EmptyCacheKey,

    /// A render-target adapter rejected a patch.
    #[error("patch failed: {0}")]
    Patch(#[from] AdapterError),

    /// A rerender boundary received props it does not understand.
    #[error("invalid boundary props: {0}")]
    BoundaryProps(&'static str),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A user callable failed.
    #[error("{0}")]
    Callback(String),
}

/// Errors reported by render-target adapters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    /// The instance does not hold the target type this adapter writes to.
    #[error("instance is not a {expected}")]
    TargetMismatch { expected: &'static str },

    /// The adapter cannot write this value to this key.
    #[error("unsupported value for `{key}`: {reason}")]
    Unsupported { key: String, reason: String },
}

impl AdapterError {
    pub fn unsupported(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
