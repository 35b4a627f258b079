//! Link Graph
//!
//! This module implements the directed graph formed by property links and
//! the scheduler that orders nodes along it.
//!
//! # Overview
//!
//! Edges connect leaf properties, not nodes. Each link induces a node-level
//! edge from its source's node to its target's node:
//!
//! - Strong links constrain execution order: the source node always runs
//!   before the target node within a tick.
//! - Weak links do not constrain order and deliver the source value from the
//!   previous tick instead.
//!
//! The scheduler only looks at the strong-edge subgraph, which must be a DAG.

mod link;
mod scheduler;

pub use link::{LinkGraph, LinkId, PropertyLink};
pub use scheduler::{SchedulerNode, TopologicalScheduler};

pub(crate) use link::Endpoint;
