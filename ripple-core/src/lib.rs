//! Ripple Core
//!
//! This crate provides fine-grained reactive primitives:
//!
//! - Signals: observable values that record who reads them
//! - Effects: computations that re-run when a signal they read is written
//! - Stores: keyed records with per-key subscriptions
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive primitives, the runtime and dependency tracking
//! - `graph`: The dependency graph and notification order
//! - `config`: Runtime limits, loadable from JSON
//! - `error`: The error type shared by every fallible operation
//!
//! Logging goes through `tracing`; install a subscriber to see effect
//! runs, writes and failures.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use ripple_core::Runtime;
//!
//! let runtime = Runtime::new();
//! let count = runtime.create_signal(0);
//! let log = Arc::new(Mutex::new(Vec::new()));
//!
//! {
//!     let count = count.clone();
//!     let log = log.clone();
//!     runtime.create_effect(move || {
//!         log.lock().unwrap().push(format!("Count is: {}", count.get()));
//!     })?;
//! }
//!
//! count.set(1)?;
//! assert_eq!(*log.lock().unwrap(), vec!["Count is: 0", "Count is: 1"]);
//! # Ok::<(), ripple_core::ReactiveError>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{BoxError, ReactiveError, Result};
pub use graph::NodeId;
pub use reactive::{Effect, EffectOutput, EffectState, Runtime, Signal, Store};
