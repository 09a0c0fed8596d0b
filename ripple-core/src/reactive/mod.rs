//! Reactive Primitives
//!
//! This module implements the core reactive system: signals and effects.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while an effect runs, the signal registers that effect as a dependent.
//! When the signal's value is written, all dependents re-run.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems, such as logging or rendering.
//!
//! ## Stores
//!
//! A Store is a keyed record of signals with per-key subscriptions.
//!
//! # Implementation Notes
//!
//! Every primitive belongs to a [`Runtime`]. The runtime keeps a stack of
//! tracking frames; when a signal is read, it subscribes whatever effect is
//! on top of that stack. There is no global state: two runtimes are fully
//! independent.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod context;
mod effect;
mod runtime;
mod signal;
mod store;
mod subscriber;

pub use effect::{Effect, EffectState};
pub use runtime::Runtime;
pub use signal::Signal;
pub use store::Store;
pub use subscriber::EffectOutput;
