//! Topological Scheduler
//!
//! The scheduler determines the order in which nodes are visited during a
//! tick. It ensures that for every strong link, the source's node comes
//! before the target's node.
//!
//! # Algorithm
//!
//! We use Kahn's algorithm over the strong-edge subgraph:
//!
//! 1. Compute every node's in-degree, counting strong edges only
//! 2. Seed a ready set with all nodes of in-degree zero
//! 3. Repeatedly take the ready node that was created first, append it to
//!    the order, and decrement the in-degree of its dependents
//! 4. If nodes remain once the ready set is empty, they sit on a cycle
//!
//! Picking the earliest-created ready node breaks ties deterministically, so
//! the same construction sequence always produces the same order.
//!
//! Weak links are ignored entirely; they may close loops freely.
//!
//! # Caching
//!
//! The result (order or cycle) is cached and reused until the node set or
//! the strong edge set changes.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use tracing::{debug, trace};

use crate::error::CycleError;
use crate::node::handle::NodeId;

use super::link::LinkGraph;

/// A node as seen by the scheduler: its ID and its creation sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerNode {
    pub id: NodeId,
    pub sequence: u64,
}

/// Computes and caches the execution order of an engine's nodes.
#[derive(Debug, Default)]
pub struct TopologicalScheduler {
    /// Last computed result.
    cached: Option<Result<Vec<NodeId>, CycleError>>,

    /// Strong-edge revision the cache was computed against.
    revision: Option<u64>,
}

impl TopologicalScheduler {
    /// Create a new scheduler with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached order. Call whenever nodes are created or destroyed.
    pub fn invalidate(&mut self) {
        self.cached = None;
        self.revision = None;
    }

    /// Whether a cached result is available for the graph's current revision.
    pub fn is_cached(&self, links: &LinkGraph) -> bool {
        self.cached.is_some() && self.revision == Some(links.strong_revision())
    }

    /// Get the execution order, recomputing it if the cache is stale.
    pub fn order(
        &mut self,
        nodes: &[SchedulerNode],
        links: &LinkGraph,
    ) -> Result<&[NodeId], CycleError> {
        if !self.is_cached(links) {
            let result = Self::topological_sort(nodes, links);
            match &result {
                Ok(order) => trace!(nodes = order.len(), "recomputed execution order"),
                Err(err) => debug!(remaining = err.nodes.len(), "strong links form a cycle"),
            }
            self.cached = Some(result);
            self.revision = Some(links.strong_revision());
        }

        match &self.cached {
            Some(Ok(order)) => Ok(order),
            Some(Err(err)) => Err(err.clone()),
            None => Err(CycleError { nodes: Vec::new() }),
        }
    }

    /// Perform a topological sort of `nodes` along strong links.
    ///
    /// Returns nodes in order such that link sources come before targets.
    pub fn topological_sort(
        nodes: &[SchedulerNode],
        links: &LinkGraph,
    ) -> Result<Vec<NodeId>, CycleError> {
        let sequence: HashMap<NodeId, u64> =
            nodes.iter().map(|n| (n.id, n.sequence)).collect();
        let mut in_degree: HashMap<NodeId, usize> =
            nodes.iter().map(|n| (n.id, 0)).collect();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        // Calculate in-degrees. Parallel links between the same pair of
        // nodes count once each, and are released once each below.
        for (source, target) in links.strong_edges() {
            if !sequence.contains_key(&source) {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(&target) {
                *degree += 1;
                dependents.entry(source).or_default().push(target);
            }
        }

        let mut ready: BinaryHeap<Reverse<(u64, NodeId)>> = nodes
            .iter()
            .filter(|n| in_degree.get(&n.id) == Some(&0))
            .map(|n| Reverse((n.sequence, n.id)))
            .collect();
        let mut result = Vec::with_capacity(nodes.len());

        // Kahn's algorithm
        while let Some(Reverse((_, node_id))) = ready.pop() {
            result.push(node_id);

            for dependent in dependents.get(&node_id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((sequence[dependent], *dependent)));
                    }
                }
            }
        }

        if result.len() == nodes.len() {
            Ok(result)
        } else {
            let mut remaining: Vec<SchedulerNode> = nodes
                .iter()
                .filter(|n| in_degree.get(&n.id).is_some_and(|d| *d > 0))
                .copied()
                .collect();
            remaining.sort_by_key(|n| n.sequence);
            Err(CycleError {
                nodes: remaining.into_iter().map(|n| n.id).collect(),
            })
        }
    }
}
