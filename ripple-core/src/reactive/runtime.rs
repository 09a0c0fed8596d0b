//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals and
//! effects. It owns the dependency graph, the tracking stack and the
//! effect registry, and it runs effects when signals change.
//!
//! # How It Works
//!
//! 1. When a signal is created, it registers a source node with the runtime.
//!
//! 2. When an effect reads a signal, the runtime records an edge from the
//!    signal to the effect on top of the tracking stack.
//!
//! 3. When a signal's value is written, the runtime:
//!    a. Snapshots the signal's dependents in effect creation order
//!    b. For each one still subscribed, clears its old edges
//!    c. Re-runs its body under a fresh tracking frame
//!
//! Runs nest: an effect that writes a signal starts a cascade that
//! finishes before the write returns. An effect that is already on the
//! tracking stack is never re-entered; that write fails with
//! [`ReactiveError::CyclicDependency`] instead.
//!
//! # Thread Safety
//!
//! All state sits behind one re-entrant lock. A write holds it for the
//! whole cascade, so the thread running effects can re-enter freely while
//! other threads wait. The inner `RefCell` is only borrowed for short,
//! non-reentrant bookkeeping; user code never runs while it is borrowed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use smallvec::SmallVec;

use super::context::{Frame, ReactiveContext, TrackingStack};
use super::effect::{Effect, EffectState};
use super::signal::Signal;
use super::subscriber::{EffectOutput, Subscriber};
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};
use crate::graph::{Node, NodeId, NodeKind, UpdateScheduler};

/// Registry entry for a live effect.
pub(crate) struct EffectSlot {
    subscriber: Arc<Subscriber>,
    state: EffectState,
    run_count: usize,
    parent: Option<NodeId>,
    /// Effects created during the last run; disposed before the next one.
    children: SmallVec<[NodeId; 4]>,
}

impl EffectSlot {
    fn new(subscriber: Arc<Subscriber>, parent: Option<NodeId>) -> Self {
        Self {
            subscriber,
            state: EffectState::Created,
            run_count: 0,
            parent,
            children: SmallVec::new(),
        }
    }
}

/// Everything the runtime mutates.
#[derive(Default)]
pub(crate) struct RuntimeState {
    pub(crate) graph: UpdateScheduler,
    pub(crate) tracking: TrackingStack,
    effects: HashMap<NodeId, EffectSlot>,
}

type PreparedRun = (Arc<Subscriber>, Vec<EffectSlot>);

impl RuntimeState {
    /// Validate and prepare a run of `id`.
    ///
    /// Returns `None` for disposed effects. The returned slots are the
    /// children disposed by this run; the caller drops them once the state
    /// is no longer borrowed, since dropping a body can drop signals.
    fn begin_run(&mut self, id: NodeId, limit: usize) -> Result<Option<PreparedRun>> {
        if !self.effects.contains_key(&id) {
            return Ok(None);
        }
        if self.tracking.contains_effect(id) {
            return Err(ReactiveError::CyclicDependency { effect: id });
        }
        if self.tracking.effect_depth() >= limit {
            return Err(ReactiveError::CascadeTooDeep { limit });
        }

        self.graph.clear_dependencies(id);

        let children = self
            .effects
            .get_mut(&id)
            .map(|slot| std::mem::take(&mut slot.children))
            .unwrap_or_default();
        let mut garbage = Vec::new();
        for child in children {
            garbage.extend(self.dispose_tree(child));
        }

        let Some(slot) = self.effects.get_mut(&id) else {
            return Ok(None);
        };
        slot.state = EffectState::Tracking;
        slot.run_count += 1;
        Ok(Some((Arc::clone(&slot.subscriber), garbage)))
    }

    /// Mark a run as finished. Called when its tracking frame pops.
    pub(crate) fn finish_run(&mut self, id: NodeId) {
        if let Some(slot) = self.effects.get_mut(&id) {
            if slot.state == EffectState::Tracking {
                slot.state = EffectState::Idle;
            }
        }
    }

    /// Remove an effect and all of its descendants from the registry and
    /// the graph.
    fn dispose_tree(&mut self, root: NodeId) -> Vec<EffectSlot> {
        let mut garbage = Vec::new();
        let mut pending = vec![root];

        while let Some(id) = pending.pop() {
            let Some(slot) = self.effects.remove(&id) else {
                continue;
            };
            self.graph.remove_node(id);

            if let Some(parent) = slot.parent.and_then(|p| self.effects.get_mut(&p)) {
                parent.children.retain(|child| *child != id);
            }
            pending.extend(slot.children.iter().copied());
            garbage.push(slot);
        }

        garbage
    }
}

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    state: ReentrantMutex<RefCell<RuntimeState>>,
}

impl RuntimeInner {
    pub(crate) fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            state: ReentrantMutex::new(RefCell::new(RuntimeState::default())),
        }
    }

    /// Hold the runtime lock across a compound operation.
    pub(crate) fn exclusive(&self) -> ReentrantMutexGuard<'_, RefCell<RuntimeState>> {
        self.state.lock()
    }

    /// Run a short bookkeeping closure against the state.
    ///
    /// `f` must not call back into user code.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut RuntimeState) -> R) -> R {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    pub(crate) fn register_source(&self) -> NodeId {
        self.with_state(|state| state.graph.add_node(Node::source()))
    }

    /// Drop a signal's node when its last handle goes away.
    pub(crate) fn release_source(&self, id: NodeId) {
        let guard = self.state.lock();
        let borrowed = guard.try_borrow_mut();
        match borrowed {
            Ok(mut state) => {
                state.graph.remove_node(id);
            }
            Err(_) => tracing::warn!(signal = %id, "signal dropped during bookkeeping; node kept"),
        };
    }

    /// Whether reads would register a dependency right now.
    pub(crate) fn is_tracking(&self) -> bool {
        self.with_state(|state| state.tracking.is_tracking())
    }

    /// Subscribe the running effect, if any, to `source`.
    pub(crate) fn track_read(&self, source: NodeId) {
        self.with_state(|state| {
            let Some(effect) = state.tracking.current_subscriber() else {
                return;
            };
            // Effects disposed mid-run keep running but collect nothing.
            if !state.effects.contains_key(&effect) {
                return;
            }
            if state.graph.add_edge(source, effect) {
                tracing::trace!(signal = %source, effect = %effect, "dependency registered");
            }
        });
    }

    /// Apply a write to `source` and run its subscribers.
    pub(crate) fn write(&self, source: NodeId, apply: impl FnOnce()) -> Result<()> {
        let _exec = self.exclusive();
        apply();
        self.notify(source)
    }

    fn notify(&self, source: NodeId) -> Result<()> {
        let subscribers = self.with_state(|state| state.graph.dispatch_order(source));
        tracing::debug!(signal = %source, subscribers = subscribers.len(), "signal written");

        for effect in subscribers {
            // An earlier subscriber may have disposed this one or changed
            // what it reads.
            if !self.with_state(|state| state.graph.has_edge(source, effect)) {
                continue;
            }
            self.run_effect(effect)?;
        }

        Ok(())
    }

    /// Add an effect to the registry without running it.
    pub(crate) fn register_effect<F, R>(&self, body: F) -> NodeId
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        let node = Node::effect();
        let id = node.id();
        let subscriber = Arc::new(Subscriber::new(id, body));

        let parent = self.with_state(|state| {
            state.graph.add_node(node);

            let parent = state
                .tracking
                .owner()
                .filter(|owner| state.effects.contains_key(owner));
            if let Some(slot) = parent.and_then(|owner| state.effects.get_mut(&owner)) {
                slot.children.push(id);
            }
            state.effects.insert(id, EffectSlot::new(subscriber, parent));
            parent
        });

        tracing::debug!(effect = %id, parent = ?parent, "effect created");
        id
    }

    /// Run an effect under a fresh tracking frame.
    pub(crate) fn run_effect(&self, id: NodeId) -> Result<()> {
        let _exec = self.exclusive();
        let limit = self.config.max_cascade_depth;

        let prepared = self.with_state(|state| state.begin_run(id, limit));
        let (subscriber, garbage) = match prepared {
            Ok(Some(prepared)) => prepared,
            Ok(None) => return Ok(()),
            Err(error) => {
                tracing::warn!(effect = %id, %error, "effect run refused");
                return Err(error);
            }
        };
        drop(garbage);

        let depth = self.with_state(|state| state.tracking.depth());
        let outcome = {
            let _ctx = ReactiveContext::enter(self, Frame::Effect(id));
            tracing::trace!(effect = %id, "running effect");
            subscriber.notify()
        };

        let found = self.with_state(|state| {
            let found = state.tracking.depth();
            if found > depth {
                state.tracking.truncate(depth);
            }
            found
        });
        if found != depth {
            tracing::error!(effect = %id, expected = depth, found, "tracking context left stale");
            return Err(ReactiveError::StaleContext {
                expected: depth,
                found,
            });
        }

        outcome.map_err(|source| {
            let error = ReactiveError::from_body(id, source);
            if matches!(error, ReactiveError::EffectFailed { .. }) {
                tracing::warn!(effect = %id, %error, "effect body failed");
            }
            error
        })
    }

    /// Dispose an effect and its children. Idempotent.
    pub(crate) fn dispose(&self, id: NodeId) {
        let _exec = self.exclusive();
        let garbage = self.with_state(|state| state.dispose_tree(id));
        for slot in &garbage {
            tracing::debug!(effect = %slot.subscriber.id(), "effect disposed");
        }
        drop(garbage);
    }

    pub(crate) fn effect_state(&self, id: NodeId) -> EffectState {
        self.with_state(|state| {
            state
                .effects
                .get(&id)
                .map_or(EffectState::Disposed, |slot| slot.state)
        })
    }

    pub(crate) fn run_count(&self, id: NodeId) -> usize {
        self.with_state(|state| state.effects.get(&id).map_or(0, |slot| slot.run_count))
    }

    pub(crate) fn child_count(&self, id: NodeId) -> usize {
        self.with_state(|state| state.effects.get(&id).map_or(0, |slot| slot.children.len()))
    }

    pub(crate) fn dependency_count(&self, id: NodeId) -> usize {
        self.with_state(|state| state.graph.dependency_count(id))
    }

    pub(crate) fn subscriber_count(&self, id: NodeId) -> usize {
        self.with_state(|state| state.graph.dependent_count(id))
    }
}

/// Owner of a reactive graph.
///
/// A runtime is a cheap handle; clones share the same graph. Signals and
/// effects keep only a weak reference back to it, so dropping every
/// runtime handle tears the graph down and leaves signals as plain cells.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use ripple_core::Runtime;
///
/// let runtime = Runtime::new();
/// let count = runtime.create_signal(0);
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let effect = {
///     let count = count.clone();
///     let seen = seen.clone();
///     runtime.create_effect(move || seen.lock().unwrap().push(count.get()))?
/// };
///
/// count.set(5)?;
/// assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
///
/// effect.dispose();
/// count.set(6)?;
/// assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
/// # Ok::<(), ripple_core::ReactiveError>(())
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RuntimeInner::new(RuntimeConfig::default())),
        }
    }

    /// Create a runtime with a validated configuration.
    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RuntimeInner::new(config)),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Create a signal owned by this runtime.
    pub fn create_signal<T>(&self, value: T) -> Signal<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Signal::new(self, value)
    }

    /// Create an effect and run it once.
    ///
    /// See [`Effect::new`].
    pub fn create_effect<F, R>(&self, body: F) -> Result<Effect>
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        Effect::new(self, body)
    }

    /// Run `f` without registering any of its reads.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _exec = self.inner.exclusive();
        let _ctx = ReactiveContext::enter(&self.inner, Frame::Untracked);
        f()
    }

    /// Whether a signal read in this runtime would register a dependency
    /// right now.
    ///
    /// The tracking stack belongs to the runtime, not to a thread. A call
    /// from outside a running cascade waits on the runtime lock until the
    /// cascade finishes, then reports `false`.
    pub fn is_tracking(&self) -> bool {
        self.inner.is_tracking()
    }

    /// The effect reads are currently attributed to.
    pub fn current_effect(&self) -> Option<NodeId> {
        self.inner
            .with_state(|state| state.tracking.current_subscriber())
    }

    /// Number of live signals.
    pub fn signal_count(&self) -> usize {
        self.inner
            .with_state(|state| state.graph.count(NodeKind::Source))
    }

    /// Number of live (not disposed) effects.
    pub fn effect_count(&self) -> usize {
        self.inner.with_state(|state| state.effects.len())
    }

    pub(crate) fn inner(&self) -> &RuntimeInner {
        &self.inner
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Arc::downgrade(&self.inner)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("signal_count", &self.signal_count())
            .field("effect_count", &self.effect_count())
            .finish()
    }
}
