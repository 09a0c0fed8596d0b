//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency is written, the effect re-runs synchronously,
//!    before the write returns.
//!
//! 3. Before re-running, the effect drops its old subscriptions and any
//!    effects it created during the previous run, then tracks new ones
//!    during execution. Conditional reads therefore only subscribe to the
//!    branch that actually ran.
//!
//! # Lifecycle
//!
//! ```text
//! Created -> Tracking -> Idle -> Tracking -> Idle -> ... -> Disposed
//! ```
//!
//! Dropping an [`Effect`] handle does not stop the effect; it stays live
//! until [`Effect::dispose`] is called, its parent effect re-runs, or the
//! runtime is dropped.
//!
//! # Failure
//!
//! If the body returns an error or panics, the tracking frame is popped
//! before the failure reaches the caller. Dependencies read before the
//! failure stay registered; reads that never happened are not.

use std::fmt;
use std::sync::Weak;

use super::runtime::{Runtime, RuntimeInner};
use super::subscriber::EffectOutput;
use crate::error::Result;
use crate::graph::NodeId;

/// Where an effect is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    /// Registered but never run (lazy effects only).
    Created,
    /// The body is executing and reads are being attributed to it.
    Tracking,
    /// Waiting for a dependency to change.
    Idle,
    /// Terminal. Notifications are ignored.
    Disposed,
}

/// Handle to a side-effecting computation that runs when dependencies
/// change.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
/// use ripple_core::{Effect, Runtime};
///
/// let runtime = Runtime::new();
/// let count = runtime.create_signal(0);
/// let last = Arc::new(AtomicI32::new(-1));
///
/// let effect = {
///     let count = count.clone();
///     let last = last.clone();
///     Effect::new(&runtime, move || last.store(count.get(), Ordering::SeqCst))?
/// };
///
/// count.set(5)?;
/// assert_eq!(last.load(Ordering::SeqCst), 5);
/// assert_eq!(effect.run_count(), 2);
/// # Ok::<(), ripple_core::ReactiveError>(())
/// ```
#[derive(Clone)]
pub struct Effect {
    id: NodeId,
    runtime: Weak<RuntimeInner>,
}

impl Effect {
    /// Create a new effect and run it once.
    ///
    /// If the first run fails, the effect is disposed and the error is
    /// returned; there is no handle to retry with.
    pub fn new<F, R>(runtime: &Runtime, body: F) -> Result<Self>
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        let effect = Self::new_lazy(runtime, body);
        if let Err(error) = runtime.inner().run_effect(effect.id) {
            runtime.inner().dispose(effect.id);
            return Err(error);
        }
        Ok(effect)
    }

    /// Create a new effect without running it.
    ///
    /// The effect has no dependencies until [`Effect::start`] is called.
    pub fn new_lazy<F, R>(runtime: &Runtime, body: F) -> Self
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        let id = runtime.inner().register_effect(body);
        Self {
            id,
            runtime: runtime.downgrade(),
        }
    }

    /// Run a lazy effect for the first time.
    ///
    /// Does nothing if the effect has already run or was disposed. A
    /// failed start leaves the effect live with whatever it read.
    pub fn start(&self) -> Result<()> {
        let Some(runtime) = self.runtime.upgrade() else {
            return Ok(());
        };
        if runtime.effect_state(self.id) != EffectState::Created {
            return Ok(());
        }
        runtime.run_effect(self.id)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Dispose of the effect.
    ///
    /// Unsubscribes it from every signal and disposes effects it created.
    /// If called from inside the effect's own body, the current run
    /// finishes but registers nothing further.
    pub fn dispose(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.dispose(self.id);
        }
    }

    pub fn state(&self) -> EffectState {
        self.runtime
            .upgrade()
            .map_or(EffectState::Disposed, |runtime| runtime.effect_state(self.id))
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == EffectState::Disposed
    }

    /// Number of times the body has started running.
    pub fn run_count(&self) -> usize {
        self.runtime
            .upgrade()
            .map_or(0, |runtime| runtime.run_count(self.id))
    }

    /// Number of signals read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.runtime
            .upgrade()
            .map_or(0, |runtime| runtime.dependency_count(self.id))
    }

    /// Number of live effects created during the last run.
    pub fn child_count(&self) -> usize {
        self.runtime
            .upgrade()
            .map_or(0, |runtime| runtime.child_count(self.id))
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Effect {}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReactiveError;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn effect_runs_on_creation() {
        let runtime = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::new(&runtime, move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
        assert_eq!(effect.state(), EffectState::Idle);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let runtime = Runtime::new();
        let signal = runtime.create_signal(1);
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = {
            let signal = signal.clone();
            Effect::new_lazy(&runtime, move || {
                signal.get();
                run_count_clone.fetch_add(1, Ordering::SeqCst);
            })
        };

        // Effect should not have run and is not subscribed yet
        assert_eq!(effect.state(), EffectState::Created);
        assert_eq!(effect.run_count(), 0);
        signal.set(2).unwrap();
        assert_eq!(run_count.load(Ordering::SeqCst), 0);

        effect.start().unwrap();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        // Starting twice is a no-op
        effect.start().unwrap();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        signal.set(3).unwrap();
        assert_eq!(run_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let runtime = Runtime::new();
        let signal = runtime.create_signal(0);
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = {
            let signal = signal.clone();
            Effect::new(&runtime, move || {
                signal.get();
                run_count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(1).unwrap();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        // Disposing again is harmless
        effect.dispose();
        assert!(effect.is_disposed());
    }

    #[test]
    fn effect_clone_shares_state() {
        let runtime = Runtime::new();
        let effect1 = Effect::new(&runtime, || {}).unwrap();
        let effect2 = effect1.clone();

        assert_eq!(effect1, effect2);
        assert_eq!(effect2.run_count(), 1);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn failed_first_run_disposes_effect() {
        let runtime = Runtime::new();
        let signal = runtime.create_signal(0);

        let result = {
            let signal = signal.clone();
            Effect::new(&runtime, move || -> Result<(), String> {
                signal.get();
                Err("not ready".to_string())
            })
        };

        match result {
            Err(ReactiveError::EffectFailed { source, .. }) => {
                assert_eq!(source.to_string(), "not ready");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(runtime.effect_count(), 0);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn handles_outliving_the_runtime_report_disposed() {
        let runtime = Runtime::new();
        let effect = Effect::new(&runtime, || {}).unwrap();

        drop(runtime);

        assert!(effect.is_disposed());
        assert_eq!(effect.run_count(), 0);
        effect.dispose();
        effect.start().unwrap();
    }
}
