//! Reactive Store
//!
//! A keyed record where every property is its own signal. Reading a key
//! inside an effect subscribes to that key only, so writing `"name"` does
//! not re-run effects that read `"age"`.
//!
//! Structural reads (`keys`, `len`) subscribe to a separate shape signal
//! that changes only when a key is inserted or removed.
//!
//! A key only gets a signal once it is written or read inside an effect.
//! Untracked reads of missing keys allocate nothing, and removing a key
//! nobody watches drops its signal.
//!
//! Every property write is logged at `info` level with its key and value.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::runtime::{Runtime, RuntimeInner};
use super::signal::Signal;
use crate::error::Result;

/// A keyed collection of signals.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Runtime, Store};
///
/// let runtime = Runtime::new();
/// let state: Store<&str, i32> = Store::new(&runtime);
///
/// state.set("count", 5)?;
/// assert_eq!(state.get(&"count"), Some(5));
/// assert_eq!(state.keys(), vec!["count"]);
/// # Ok::<(), ripple_core::ReactiveError>(())
/// ```
pub struct Store<K, V> {
    runtime: Weak<RuntimeInner>,
    /// One signal per present or watched key. Removed keys that an effect
    /// still reads keep their signal (set to `None`) so the effect sees a
    /// later re-insert.
    entries: Arc<Mutex<IndexMap<K, Signal<Option<V>>>>>,
    shape: Signal<u64>,
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
{
    /// Create an empty store.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.downgrade(),
            entries: Arc::new(Mutex::new(IndexMap::new())),
            shape: Signal::new(runtime, 0),
        }
    }

    /// The signal behind `key`, if the key has one.
    fn existing(&self, key: &K) -> Option<Signal<Option<V>>> {
        self.entries.lock().get(key).cloned()
    }

    /// The signal a read of `key` should go through.
    ///
    /// Only a tracked read needs a signal for a missing key, so that the
    /// effect hears about a later insert.
    fn read_slot(&self, key: &K) -> Option<Signal<Option<V>>> {
        if let Some(signal) = self.existing(key) {
            return Some(signal);
        }
        let tracking = self
            .runtime
            .upgrade()
            .is_some_and(|runtime| runtime.is_tracking());
        tracking.then(|| self.slot(key))
    }

    /// Get or create the signal behind `key`.
    fn slot(&self, key: &K) -> Signal<Option<V>> {
        if let Some(signal) = self.existing(key) {
            return signal;
        }

        // Registering a signal takes the runtime lock; never do that while
        // holding the entries lock.
        let fresh = Signal::attach(self.runtime.clone(), None);
        let signal = self
            .entries
            .lock()
            .entry(key.clone())
            .or_insert_with(|| fresh.clone())
            .clone();
        signal
    }

    /// Read a property, subscribing to that key.
    pub fn get(&self, key: &K) -> Option<V> {
        self.read_slot(key).and_then(|signal| signal.get())
    }

    /// Whether a property is present, subscribing to that key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.read_slot(key)
            .is_some_and(|signal| signal.with(Option::is_some))
    }

    /// Write a property and re-run the effects that read it.
    pub fn set(&self, key: K, value: V) -> Result<()> {
        let slot = self.slot(&key);
        let inserted = slot.with_untracked(Option::is_none);

        tracing::info!(key = ?key, value = ?value, "store property changed");
        slot.set(Some(value))?;

        if inserted {
            self.shape.update(|version| version + 1)?;
        }
        Ok(())
    }

    /// Remove a property, returning its last value.
    ///
    /// The key's signal is kept only while some effect still reads it.
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        // Nothing may subscribe between the count check and the removal.
        let runtime = self.runtime.upgrade();
        let _exec = runtime.as_ref().map(|runtime| runtime.exclusive());

        let Some(slot) = self.existing(key) else {
            return Ok(None);
        };

        let previous = slot.get_untracked();
        if previous.is_some() {
            tracing::info!(key = ?key, "store property removed");
            slot.set(None)?;
            self.shape.update(|version| version + 1)?;
        }

        if slot.subscriber_count() == 0 {
            // Dropped after the entries lock is released.
            let unused = self.entries.lock().shift_remove(key);
            drop(unused);
        }
        Ok(previous)
    }

    /// Present keys in insertion order, subscribing to the store's shape.
    pub fn keys(&self) -> Vec<K> {
        self.shape.get();
        self.entries
            .lock()
            .iter()
            .filter(|(_, signal)| signal.with_untracked(Option::is_some))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of present keys, subscribing to the store's shape.
    pub fn len(&self) -> usize {
        self.shape.get();
        self.entries
            .lock()
            .values()
            .filter(|signal| signal.with_untracked(Option::is_some))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            entries: Arc::clone(&self.entries),
            shape: self.shape.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
        let count = Arc::new(AtomicI32::new(0));
        (count.clone(), count)
    }

    #[test]
    fn get_set_remove() {
        let runtime = Runtime::new();
        let store: Store<String, i32> = Store::new(&runtime);

        assert_eq!(store.get(&"a".to_string()), None);
        store.set("a".to_string(), 1).unwrap();
        store.set("b".to_string(), 2).unwrap();

        assert_eq!(store.get(&"a".to_string()), Some(1));
        assert_eq!(store.len(), 2);

        assert_eq!(store.remove(&"a".to_string()).unwrap(), Some(1));
        assert_eq!(store.remove(&"a".to_string()).unwrap(), None);
        assert_eq!(store.remove(&"zzz".to_string()).unwrap(), None);
        assert_eq!(store.keys(), vec!["b".to_string()]);
        assert!(!store.contains_key(&"a".to_string()));
    }

    #[test]
    fn untracked_misses_allocate_nothing() {
        let runtime = Runtime::new();
        let store: Store<u32, i32> = Store::new(&runtime);
        let baseline = runtime.signal_count();

        for key in 0..1_000 {
            assert_eq!(store.get(&key), None);
            assert!(!store.contains_key(&key));
        }
        assert_eq!(runtime.signal_count(), baseline);
        assert!(store.entries.lock().is_empty());

        // Removing an unwatched key releases its signal
        store.set(7, 1).unwrap();
        assert_eq!(runtime.signal_count(), baseline + 1);
        assert_eq!(store.remove(&7).unwrap(), Some(1));
        assert_eq!(runtime.signal_count(), baseline);
        assert!(store.is_empty());
    }

    #[test]
    fn watched_key_survives_removal() {
        let runtime = Runtime::new();
        let store: Store<&'static str, i32> = Store::new(&runtime);
        store.set("watched", 1).unwrap();

        let effect = {
            let store = store.clone();
            runtime
                .create_effect(move || {
                    store.get(&"watched");
                })
                .unwrap()
        };

        store.remove(&"watched").unwrap();
        assert_eq!(store.entries.lock().len(), 1);

        // Once nobody reads it, the next removal drops it
        effect.dispose();
        store.remove(&"watched").unwrap();
        assert!(store.entries.lock().is_empty());
    }

    #[test]
    fn effects_track_individual_keys() {
        let runtime = Runtime::new();
        let store: Store<&'static str, i32> = Store::new(&runtime);
        store.set("count", 0).unwrap();
        store.set("other", 0).unwrap();

        let (runs, runs_clone) = counter();
        let _effect = {
            let store = store.clone();
            runtime
                .create_effect(move || {
                    store.get(&"count");
                    runs_clone.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };

        store.set("count", 5).unwrap();
        store.set("count", 4).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        store.set("other", 1).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn missing_key_reader_sees_later_insert() {
        let runtime = Runtime::new();
        let store: Store<&'static str, i32> = Store::new(&runtime);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _effect = {
            let store = store.clone();
            let seen = seen.clone();
            runtime
                .create_effect(move || seen.lock().push(store.get(&"late")))
                .unwrap()
        };

        store.set("late", 9).unwrap();
        store.remove(&"late").unwrap();
        assert_eq!(*seen.lock(), vec![None, Some(9), None]);
    }

    #[test]
    fn shape_readers_ignore_value_changes() {
        let runtime = Runtime::new();
        let store: Store<&'static str, i32> = Store::new(&runtime);
        store.set("a", 1).unwrap();

        let (runs, runs_clone) = counter();
        let _effect = {
            let store = store.clone();
            runtime
                .create_effect(move || {
                    store.keys();
                    runs_clone.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };

        // Value change on an existing key
        store.set("a", 2).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Insert and remove change the shape
        store.set("b", 1).unwrap();
        store.remove(&"a").unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
