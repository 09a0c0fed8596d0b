//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect runs, the signal registers
//!    that effect as a subscriber. Reading twice in one run subscribes once.
//!
//! 2. When a signal is written, every subscriber re-runs, in the order the
//!    effects were created, before the write returns.
//!
//! 3. Writes always notify, even when the new value equals the old one.
//!    Use [`Signal::set_if_changed`] to skip notification for equal values.
//!
//! # Thread Safety
//!
//! Signals are `Send + Sync` for thread-safe values. The value sits behind
//! a `RwLock`; subscriber bookkeeping lives in the owning runtime.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A node ID (8 bytes) and a weak runtime reference
//! - The value, shared by all clones behind an `Arc`
//!
//! The graph node is released when the last clone is dropped.

use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::runtime::{Runtime, RuntimeInner};
use crate::error::Result;
use crate::graph::NodeId;

/// Registration of a signal's node; releases it on drop.
struct SourceNode {
    id: NodeId,
    runtime: Weak<RuntimeInner>,
}

impl Drop for SourceNode {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.release_source(self.id);
        }
    }
}

struct SignalInner<T> {
    node: SourceNode,
    value: RwLock<T>,
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use ripple_core::Runtime;
///
/// let runtime = Runtime::new();
/// let count = runtime.create_signal(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (re-runs subscribers)
/// count.set(5)?;
/// count.update(|n| n + 1)?;
/// assert_eq!(count.get(), 6);
/// # Ok::<(), ripple_core::ReactiveError>(())
/// ```
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self::attach(runtime.downgrade(), value)
    }

    /// Create a signal against a possibly-dead runtime.
    ///
    /// Without a runtime the signal is a plain cell with a fresh ID.
    pub(crate) fn attach(runtime: Weak<RuntimeInner>, value: T) -> Self {
        let id = runtime
            .upgrade()
            .map(|runtime| runtime.register_source())
            .unwrap_or_default();

        Self {
            inner: Arc::new(SignalInner {
                node: SourceNode { id, runtime },
                value: RwLock::new(value),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.node.id
    }

    /// Get the current value.
    ///
    /// If called while an effect is running, this also subscribes that
    /// effect to the signal.
    pub fn get(&self) -> T {
        self.track();
        self.inner.value.read().clone()
    }

    /// Borrow the current value, with the same tracking as [`Signal::get`].
    ///
    /// The value stays read-locked while `f` runs, so `f` must not write
    /// this signal, directly or through any write whose cascade reaches
    /// it. Either deadlocks.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&*self.inner.value.read())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the current value without tracking dependencies.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.read())
    }

    /// Set a new value and re-run subscribers.
    ///
    /// Returns the first error raised by a subscriber. Subscribers after
    /// the failing one are not run for this write.
    pub fn set(&self, value: T) -> Result<()> {
        match self.inner.node.runtime.upgrade() {
            Some(runtime) => runtime.write(self.id(), || *self.inner.value.write() = value),
            None => {
                *self.inner.value.write() = value;
                Ok(())
            }
        }
    }

    /// Update the value using a function of the current value.
    ///
    /// The current value is read untracked.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<()> {
        let runtime = self.inner.node.runtime.upgrade();
        let _exec = runtime.as_ref().map(|runtime| runtime.exclusive());

        let next = f(&*self.inner.value.read());
        self.set(next)
    }

    /// Set a new value only if it differs from the current one.
    ///
    /// Returns whether subscribers were notified.
    pub fn set_if_changed(&self, value: T) -> Result<bool>
    where
        T: PartialEq,
    {
        let unchanged = *self.inner.value.read() == value;
        if unchanged {
            return Ok(false);
        }
        self.set(value)?;
        Ok(true)
    }

    /// Get the number of effects subscribed to this signal.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .node
            .runtime
            .upgrade()
            .map_or(0, |runtime| runtime.subscriber_count(self.id()))
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Signal<T> {
    fn track(&self) {
        if let Some(runtime) = self.inner.node.runtime.upgrade() {
            runtime.track_read(self.inner.node.id);
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
