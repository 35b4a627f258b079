//! Update Reports
//!
//! Diagnostics about a single tick: which nodes ran, which were skipped
//! because their inputs did not change, how many link propagations changed a
//! value, and where the time went.

use std::time::Duration;

use crate::node::handle::NodeHandle;

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub(crate) executed: Vec<NodeHandle>,
    pub(crate) skipped: Vec<NodeHandle>,
    pub(crate) links_activated: usize,
    pub(crate) sort_time: Duration,
    pub(crate) total_time: Duration,
}

impl UpdateReport {
    /// Nodes whose update ran, in execution order.
    pub fn executed(&self) -> &[NodeHandle] {
        &self.executed
    }

    /// Nodes that were visited but not run, in visiting order.
    pub fn skipped(&self) -> &[NodeHandle] {
        &self.skipped
    }

    /// Number of link propagations that changed a target value.
    pub fn links_activated(&self) -> usize {
        self.links_activated
    }

    /// Time spent obtaining the execution order.
    pub fn sort_time(&self) -> Duration {
        self.sort_time
    }

    /// Time spent in the whole tick.
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    /// Drop every mention of a destroyed node.
    pub(crate) fn forget(&mut self, node: NodeHandle) {
        self.executed.retain(|n| *n != node);
        self.skipped.retain(|n| *n != node);
    }
}
