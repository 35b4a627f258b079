//! Persistence
//!
//! Engine content is serialized to MessagePack with `rmp-serde`.
//!
//! # Format
//!
//! The saved document holds a format version, every node (name, creation
//! configuration and all leaf values of both trees, in slot order), every
//! link (endpoints as node position plus slot, the weak flag and the lagged
//! value of weak links) and the scene state. Nodes are stored in creation
//! order, so the loaded engine schedules identically.
//!
//! Script functions are not serialized. A script node stores the name of
//! its definition, which must be registered on the loading engine.
//!
//! # Atomicity
//!
//! `load` builds the new content off to the side and only replaces the
//! engine's content once everything has been decoded and validated. A failed
//! load leaves the engine exactly as it was.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, PersistenceError};
use crate::graph::{Endpoint, LinkGraph, TopologicalScheduler};
use crate::node::handle::{Direction, NodeHandle, NodeId, PropertyHandle};
use crate::node::{LogicNode, NodeArena, NodeConfig};
use crate::property::Value;
use crate::scene::SceneState;

use super::LogicEngine;

/// Version written by `save` and accepted by `load`.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct Header {
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedEngine {
    version: u32,
    nodes: Vec<SavedNode>,
    links: Vec<SavedLink>,
    scene: SceneState,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedNode {
    name: String,
    config: NodeConfig,
    inputs: Option<Vec<Value>>,
    outputs: Option<Vec<Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedEndpoint {
    /// Position of the node in `SavedEngine::nodes`.
    node: usize,
    direction: Direction,
    slot: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedLink {
    source: SavedEndpoint,
    target: SavedEndpoint,
    weak: bool,
    lagged: Value,
}

/// Content produced by a successful load, ready to be swapped in.
struct Restored {
    nodes: NodeArena,
    links: LinkGraph,
    scene: SceneState,
    next_sequence: u64,
}

impl LogicEngine {
    /// Serialize the whole engine.
    ///
    /// Fails if the strong links form a cycle.
    pub fn save(&mut self) -> Result<Vec<u8>, EngineError> {
        let result = self.save_inner();
        self.record(result, None)
    }

    fn save_inner(&mut self) -> Result<Vec<u8>, EngineError> {
        let order = self.execution_order();
        if let Err(error) = &order {
            self.warn_cycle(error);
        }
        order?;

        let ids = self.nodes.ids_in_creation_order();
        let positions: HashMap<NodeId, usize> =
            ids.iter().enumerate().map(|(position, &id)| (id, position)).collect();
        let position = |id: NodeId| positions.get(&id).copied();

        let nodes = ids
            .iter()
            .filter_map(|&id| self.nodes.get(id))
            .map(|node| SavedNode {
                name: node.name().to_string(),
                config: node.kind().config(node.inputs()),
                inputs: node.inputs().map(|t| t.leaf_values()),
                outputs: node.outputs().map(|t| t.leaf_values()),
            })
            .collect();

        let mut links = Vec::with_capacity(self.links.len());
        for link in self.links.links() {
            let endpoint = |prop: PropertyHandle| {
                position(prop.node().id())
                    .map(|node| SavedEndpoint {
                        node,
                        direction: prop.direction(),
                        slot: prop.slot(),
                    })
                    .ok_or_else(|| {
                        PersistenceError::Encode(format!("link {} has a dangling endpoint", link.id().raw()))
                    })
            };
            links.push(SavedLink {
                source: endpoint(link.source())?,
                target: endpoint(link.target())?,
                weak: link.is_weak(),
                lagged: link.lagged_value().clone(),
            });
        }

        let saved = SavedEngine {
            version: FORMAT_VERSION,
            nodes,
            links,
            scene: self.scene.clone(),
        };
        let bytes = rmp_serde::to_vec_named(&saved)
            .map_err(|e| PersistenceError::Encode(e.to_string()))?;
        debug!(
            nodes = saved.nodes.len(),
            links = saved.links.len(),
            bytes = bytes.len(),
            "saved engine content"
        );
        Ok(bytes)
    }

    /// Replace the engine's content with previously saved content.
    ///
    /// Script definitions referenced by the content must already be
    /// registered. All loaded nodes run on the next tick.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        let result = self.restore(bytes).map(|restored| {
            self.nodes = restored.nodes;
            self.links = restored.links;
            self.scene = restored.scene;
            self.next_sequence = restored.next_sequence;
            self.scheduler = TopologicalScheduler::new();
            self.last_report = None;
            debug!(
                nodes = self.nodes.len(),
                links = self.links.len(),
                "loaded engine content"
            );
        });
        self.record(result, None)
    }

    fn restore(&self, bytes: &[u8]) -> Result<Restored, EngineError> {
        let header: Header =
            rmp_serde::from_slice(bytes).map_err(|e| PersistenceError::Decode(e.to_string()))?;
        if header.version != FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: header.version,
                expected: FORMAT_VERSION,
            }
            .into());
        }
        let saved: SavedEngine =
            rmp_serde::from_slice(bytes).map_err(|e| PersistenceError::Decode(e.to_string()))?;

        let mut nodes = self.nodes.successor();
        let mut ids = Vec::with_capacity(saved.nodes.len());
        for (sequence, saved_node) in saved.nodes.into_iter().enumerate() {
            let mut node = LogicNode::from_config(
                saved_node.name,
                saved_node.config,
                &self.scripts,
                &saved.scene,
                sequence as u64,
            )?;
            restore_tree(&mut node, Direction::Input, saved_node.inputs)?;
            restore_tree(&mut node, Direction::Output, saved_node.outputs)?;
            ids.push(nodes.insert(node));
        }

        let mut links = LinkGraph::new();
        for saved_link in saved.links {
            let source = self.restored_endpoint(&nodes, &ids, &saved_link.source)?;
            let target = self.restored_endpoint(&nodes, &ids, &saved_link.target)?;
            if saved_link.lagged.kind() != source.kind {
                return Err(content_error(format!(
                    "lagged value of kind {} on a {} link",
                    saved_link.lagged.kind(),
                    source.kind
                )));
            }
            links
                .link(source, target, saved_link.weak, saved_link.lagged)
                .map_err(|e| content_error(format!("invalid link: {e}")))?;
        }

        Ok(Restored {
            next_sequence: ids.len() as u64,
            nodes,
            links,
            scene: saved.scene,
        })
    }

    fn restored_endpoint(
        &self,
        nodes: &NodeArena,
        ids: &[NodeId],
        saved: &SavedEndpoint,
    ) -> Result<Endpoint, EngineError> {
        let id = *ids
            .get(saved.node)
            .ok_or_else(|| content_error(format!("link refers to missing node #{}", saved.node)))?;
        let kind = nodes
            .get(id)
            .and_then(|node| node.tree(saved.direction))
            .and_then(|tree| tree.kind(saved.slot).ok())
            .ok_or_else(|| content_error(format!("link refers to missing property {}", saved.slot)))?;
        Ok(Endpoint {
            handle: PropertyHandle::new(NodeHandle::new(self.id, id), saved.direction, saved.slot),
            kind,
        })
    }
}

fn content_error(message: String) -> EngineError {
    PersistenceError::Content(message).into()
}

fn restore_tree(
    node: &mut LogicNode,
    direction: Direction,
    values: Option<Vec<Value>>,
) -> Result<(), EngineError> {
    let name = node.name().to_string();
    match (node.tree_mut(direction), values) {
        (Some(tree), Some(values)) => tree
            .restore_leaf_values(values)
            .map_err(|e| content_error(format!("node '{name}': {e}"))),
        (None, None) => Ok(()),
        _ => Err(content_error(format!(
            "node '{name}': saved {direction:?} tree does not match its configuration"
        ))),
    }
}
