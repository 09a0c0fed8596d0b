//! Subscriber types for the reactive system.
//!
//! A Subscriber is the callable half of an effect: the body that runs
//! when one of the effect's dependencies changes.

use parking_lot::Mutex;

use crate::error::BoxError;
use crate::graph::NodeId;

/// Values an effect body may return.
///
/// Bodies that cannot fail return `()`. Fallible bodies return
/// `Result<(), E>` for any error convertible into a boxed error, which
/// lets them use `?` on signal writes.
pub trait EffectOutput {
    fn into_result(self) -> Result<(), BoxError>;
}

impl EffectOutput for () {
    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E> EffectOutput for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

type Body = dyn FnMut() -> Result<(), BoxError> + Send;

/// A subscriber to reactive values.
pub struct Subscriber {
    id: NodeId,
    /// The body is `FnMut`, so it sits behind a lock. The runtime refuses
    /// to re-enter a running effect, so the lock is never taken twice by
    /// the same cascade.
    body: Mutex<Box<Body>>,
}

impl Subscriber {
    /// Create a new subscriber with the given body.
    pub fn new<F, R>(id: NodeId, mut body: F) -> Self
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        let boxed: Box<Body> = Box::new(move || body().into_result());
        Self {
            id,
            body: Mutex::new(boxed),
        }
    }

    /// Get the subscriber's node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Invoke the body once.
    pub fn notify(&self) -> Result<(), BoxError> {
        let mut body = self.body.lock();
        (*body)()
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn subscriber_notify_calls_body() {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let subscriber = Subscriber::new(NodeId::new(), move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        subscriber.notify().unwrap();
        subscriber.notify().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fallible_body_reports_error() {
        let subscriber = Subscriber::new(NodeId::new(), || -> Result<(), String> {
            Err("no value".to_string())
        });

        let err = subscriber.notify().unwrap_err();
        assert_eq!(err.to_string(), "no value");
    }

    #[test]
    fn body_may_keep_state_between_runs() {
        let mut seen = Vec::new();
        let total = Arc::new(AtomicI32::new(0));
        let total_clone = total.clone();

        let subscriber = Subscriber::new(NodeId::new(), move || {
            seen.push(seen.len() as i32);
            total_clone.store(seen.iter().sum(), Ordering::SeqCst);
        });

        subscriber.notify().unwrap();
        subscriber.notify().unwrap();
        subscriber.notify().unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 3);
    }
}
