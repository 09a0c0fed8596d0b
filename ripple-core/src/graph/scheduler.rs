//! Update Scheduler
//!
//! The scheduler owns the dependency graph and answers one question for
//! the runtime: when a source is written, which effects must re-run, and
//! in what order.
//!
//! # Algorithm
//!
//! Edges only ever run from a source to an effect, so there is no
//! transitive propagation to compute here. A write snapshots the direct
//! dependents of the source in effect creation order; the runtime then
//! re-runs each one synchronously. Effects that write other sources while running
//! produce nested snapshots, which is how a cascade walks the graph.
//!
//! Before an effect re-runs, [`UpdateScheduler::clear_dependencies`]
//! drops every edge it owns so the next run can record a fresh set.

use std::collections::HashMap;

use indexmap::IndexSet;

use super::node::{Node, NodeId, NodeKind};

/// The update scheduler manages the dependency graph and the dispatch
/// order of notifications.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Node>,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&node_id)?;

        for dep_id in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dependent_id in node.dependents() {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        Some(node)
    }

    /// Add a dependency edge: `dependent` depends on `dependency`.
    ///
    /// Both nodes must exist. Returns `true` only when the edge is new.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) -> bool {
        if !self.nodes.contains_key(&dependency) || !self.nodes.contains_key(&dependent) {
            return false;
        }

        let added = self
            .nodes
            .get_mut(&dependency)
            .map(|node| node.add_dependent(dependent))
            .unwrap_or(false);
        if let Some(node) = self.nodes.get_mut(&dependent) {
            node.add_dependency(dependency);
        }
        added
    }

    /// Check whether `dependent` is currently subscribed to `dependency`.
    pub fn has_edge(&self, dependency: NodeId, dependent: NodeId) -> bool {
        self.nodes
            .get(&dependency)
            .is_some_and(|node| node.dependents().contains(&dependent))
    }

    /// Drop every edge from `dependent` to its sources.
    ///
    /// Returns the sources it was subscribed to, in the order they were read.
    pub fn clear_dependencies(&mut self, dependent: NodeId) -> IndexSet<NodeId> {
        let previous = match self.nodes.get_mut(&dependent) {
            Some(node) => node.take_dependencies(),
            None => return IndexSet::new(),
        };

        for source_id in &previous {
            if let Some(source) = self.nodes.get_mut(source_id) {
                source.remove_dependent(dependent);
            }
        }

        previous
    }

    /// Snapshot the effects to notify after `source_id` is written.
    ///
    /// Effects come out in the order they were created. Node ids are
    /// handed out monotonically, so sorting by id gives that order no
    /// matter when each effect last re-subscribed.
    ///
    /// The snapshot is taken before any effect runs, so effects that
    /// subscribe during the cascade are not notified by this write.
    pub fn dispatch_order(&self, source_id: NodeId) -> Vec<NodeId> {
        let Some(source) = self.nodes.get(&source_id) else {
            return Vec::new();
        };

        let mut order: Vec<NodeId> = source
            .dependents()
            .iter()
            .copied()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .is_some_and(|node| node.kind() == NodeKind::Effect)
            })
            .collect();
        order.sort_unstable();
        order
    }

    /// Number of dependents of a node, or zero if it does not exist.
    pub fn dependent_count(&self, node_id: NodeId) -> usize {
        self.nodes
            .get(&node_id)
            .map_or(0, |node| node.dependents().len())
    }

    /// Number of dependencies of a node, or zero if it does not exist.
    pub fn dependency_count(&self, node_id: NodeId) -> usize {
        self.nodes
            .get(&node_id)
            .map_or(0, |node| node.dependencies().len())
    }

    /// Get the total number of nodes of the given kind.
    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.values().filter(|node| node.kind() == kind).count()
    }
}
