//! Dependency Graph
//!
//! This module implements the graph that tracks which effects read which
//! signals.
//!
//! # Overview
//!
//! - Nodes represent reactive values (signals) or computations (effects)
//! - Edges represent dependencies: if effect E read signal S during its last
//!   run, there is an edge from S to E
//!
//! The graph is bipartite: edges always run from a source to an effect.
//! Cycles can still arise at runtime when an effect writes a signal it (or
//! an effect it triggers) reads; the runtime detects those on the call
//! stack rather than in the graph.
//!
//! # Design Decisions
//!
//! 1. The graph is centralized per runtime, indexed by node ID for O(1)
//!    lookups.
//!
//! 2. We maintain both forward (dependencies) and reverse (dependents) edges
//!    so an effect can revoke all of its subscriptions without scanning
//!    every signal.
//!
//! 3. Notification order is effect creation order, independent of when an
//!    effect last re-subscribed.

mod node;
mod scheduler;

pub use node::{Node, NodeId, NodeKind};
pub use scheduler::UpdateScheduler;
