//! Pending values.
//!
//! A store may hold the not-yet-available result of asynchronous work. It is
//! represented by a [`Pending`] value backed by a `tokio::sync::watch`
//! channel, so synchronous readers can peek and asynchronous readers can
//! wait. What a render path does with a pending reading is decided by the
//! factory's [`PendingPolicy`](super::PendingPolicy).

use std::fmt;

use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::value::Value;

/// An eventually available value.
#[derive(Clone)]
pub struct Pending {
    rx: watch::Receiver<Option<Value>>,
}

/// The write side of a [`Pending`] value.
pub struct Resolver {
    tx: watch::Sender<Option<Value>>,
}

impl Pending {
    /// Create an unresolved value and its resolver.
    pub fn channel() -> (Resolver, Pending) {
        let (tx, rx) = watch::channel(None);
        (Resolver { tx }, Pending { rx })
    }

    /// The resolved value, if resolution already happened.
    pub fn peek(&self) -> Option<Value> {
        self.rx.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait for resolution.
    pub async fn settled(&self) -> Result<Value> {
        let mut rx = self.rx.clone();
        let value = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Abandoned)?
            .clone();
        Ok(value.unwrap_or_default())
    }

    /// Two handles observe the same underlying result.
    pub fn same(&self, other: &Pending) -> bool {
        self.rx.same_channel(&other.rx)
    }
}

impl Resolver {
    pub fn resolve(self, value: Value) {
        self.tx.send_replace(Some(value));
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_sees_resolution() {
        let (resolver, pending) = Pending::channel();
        assert!(pending.peek().is_none());

        resolver.resolve(Value::from(7));
        assert_eq!(pending.peek().and_then(|v| v.as_f64()), Some(7.0));
    }

    #[test]
    fn clones_share_the_channel() {
        let (_resolver, pending) = Pending::channel();
        let (_other_resolver, other) = Pending::channel();
        assert!(pending.same(&pending.clone()));
        assert!(!pending.same(&other));
    }

    #[tokio::test]
    async fn settled_waits_for_resolver() {
        let (resolver, pending) = Pending::channel();
        let waiter = pending.clone();
        let task = tokio::spawn(async move { waiter.settled().await });

        resolver.resolve(Value::from("done"));
        let value = task.await.unwrap().unwrap();
        assert_eq!(value.as_str(), Some("done"));
    }

    #[tokio::test]
    async fn dropped_resolver_abandons() {
        let (resolver, pending) = Pending::channel();
        drop(resolver);
        assert!(matches!(pending.settled().await, Err(Error::Abandoned)));
    }
}
