//! Property Links
//!
//! The link graph stores directed edges from output leaves to input leaves.
//!
//! # Structural Rules
//!
//! Strong and weak links obey the same rules:
//!
//! - the source is an output leaf and the target an input leaf
//! - source and target belong to different nodes of the same engine
//! - both are leaves of identical kind (no coercion)
//! - a target has at most one incoming link; a source may feed any number
//!
//! A rejected link leaves the graph untouched.
//!
//! # Weak Links
//!
//! Weak links do not constrain execution order. Each one keeps a copy of its
//! source value as of the end of the previous tick (`lagged`), which is what
//! its target receives. This one-tick lag lets a feedback loop be closed by a
//! weak link without forming a cycle.

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;
use serde::{Deserialize, Serialize};

use crate::error::LinkError;
use crate::node::handle::{Direction, NodeId, PropertyHandle};
use crate::property::{PropertyKind, Value};

/// Identifier of a link, unique within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(u64);

impl LinkId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A directed, type-checked edge between two leaf properties.
#[derive(Debug, Clone)]
pub struct PropertyLink {
    id: LinkId,
    source: PropertyHandle,
    target: PropertyHandle,
    weak: bool,
    /// Source value at the end of the previous tick. Only read for weak links.
    lagged: Value,
}

impl PropertyLink {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn source(&self) -> PropertyHandle {
        self.source
    }

    pub fn target(&self) -> PropertyHandle {
        self.target
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// The value a weak link delivers this tick.
    pub fn lagged_value(&self) -> &Value {
        &self.lagged
    }

    pub(crate) fn set_lagged_value(&mut self, value: Value) {
        self.lagged = value;
    }

    pub(crate) fn source_node(&self) -> NodeId {
        self.source.node().id()
    }

    pub(crate) fn target_node(&self) -> NodeId {
        self.target.node().id()
    }
}

/// A resolved link endpoint: the property handle plus its kind.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Endpoint {
    pub handle: PropertyHandle,
    pub kind: PropertyKind,
}

/// All links of one engine.
#[derive(Debug, Default, Clone)]
pub struct LinkGraph {
    /// Links in creation order.
    links: IndexMap<LinkId, PropertyLink>,

    /// Incoming link of each linked input leaf.
    by_target: HashMap<PropertyHandle, LinkId>,

    /// Links into each node, in creation order.
    incoming: HashMap<NodeId, SmallVec<[LinkId; 4]>>,

    /// Links out of each node, in creation order.
    outgoing: HashMap<NodeId, SmallVec<[LinkId; 4]>>,

    next_id: u64,

    /// Bumped whenever the set of strong edges changes.
    strong_revision: u64,
}

impl LinkGraph {
    /// Create an empty link graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every structural rule for a prospective link.
    pub(crate) fn validate(&self, source: &Endpoint, target: &Endpoint) -> Result<(), LinkError> {
        if source.handle.node().engine() != target.handle.node().engine() {
            return Err(LinkError::ForeignEndpoint);
        }
        if source.handle.direction() != Direction::Output {
            return Err(LinkError::SourceNotOutput);
        }
        if target.handle.direction() != Direction::Input {
            return Err(LinkError::TargetNotInput);
        }
        if source.handle.node() == target.handle.node() {
            return Err(LinkError::SameNode);
        }
        if !source.kind.is_leaf() {
            return Err(LinkError::ContainerLink(source.kind));
        }
        if !target.kind.is_leaf() {
            return Err(LinkError::ContainerLink(target.kind));
        }
        if source.kind != target.kind {
            return Err(LinkError::TypeMismatch {
                from: source.kind,
                to: target.kind,
            });
        }
        if self.by_target.contains_key(&target.handle) {
            return Err(LinkError::AlreadyLinked);
        }
        Ok(())
    }

    /// Insert a link after validating it.
    ///
    /// `initial` seeds the lagged value a weak link delivers before its
    /// first end-of-tick snapshot.
    pub(crate) fn link(
        &mut self,
        source: Endpoint,
        target: Endpoint,
        weak: bool,
        initial: Value,
    ) -> Result<LinkId, LinkError> {
        self.validate(&source, &target)?;
        Ok(self.insert(source.handle, target.handle, weak, initial))
    }

    /// Insert a link without validation. Used when restoring saved content
    /// that has already been checked.
    pub(crate) fn insert(
        &mut self,
        source: PropertyHandle,
        target: PropertyHandle,
        weak: bool,
        lagged: Value,
    ) -> LinkId {
        let id = LinkId(self.next_id);
        self.next_id += 1;
        self.links.insert(
            id,
            PropertyLink {
                id,
                source,
                target,
                weak,
                lagged,
            },
        );
        self.by_target.insert(target, id);
        self.incoming.entry(target.node().id()).or_default().push(id);
        self.outgoing.entry(source.node().id()).or_default().push(id);
        if !weak {
            self.strong_revision += 1;
        }
        id
    }

    /// Remove the link from `source` to `target`.
    pub(crate) fn unlink(
        &mut self,
        source: PropertyHandle,
        target: PropertyHandle,
    ) -> Result<PropertyLink, LinkError> {
        let id = match self.by_target.get(&target) {
            Some(id) if self.links.get(id).map(|l| l.source) == Some(source) => *id,
            _ => return Err(LinkError::NotLinked),
        };
        let link = self.remove(id).ok_or(LinkError::NotLinked)?;
        if !link.weak {
            self.strong_revision += 1;
        }
        Ok(link)
    }

    /// Remove every link touching `node`. Returns the number removed.
    pub(crate) fn remove_node(&mut self, node: NodeId) -> usize {
        let mut ids: SmallVec<[LinkId; 8]> = SmallVec::new();
        ids.extend(self.incoming.get(&node).into_iter().flatten().copied());
        ids.extend(self.outgoing.get(&node).into_iter().flatten().copied());

        let mut removed = 0;
        let mut strong_removed = false;
        for id in ids {
            if let Some(link) = self.remove(id) {
                removed += 1;
                strong_removed |= !link.weak;
            }
        }
        if strong_removed {
            self.strong_revision += 1;
        }
        removed
    }

    /// Drop a link from the map and every index.
    fn remove(&mut self, id: LinkId) -> Option<PropertyLink> {
        let link = self.links.shift_remove(&id)?;
        self.by_target.remove(&link.target);
        detach(&mut self.incoming, link.target_node(), id);
        detach(&mut self.outgoing, link.source_node(), id);
        Some(link)
    }

    /// The link feeding an input leaf, if any.
    pub fn incoming(&self, target: PropertyHandle) -> Option<&PropertyLink> {
        self.by_target.get(&target).and_then(|id| self.links.get(id))
    }

    /// All links, in creation order.
    pub fn links(&self) -> impl Iterator<Item = &PropertyLink> {
        self.links.values()
    }

    pub(crate) fn links_mut(&mut self) -> impl Iterator<Item = &mut PropertyLink> {
        self.links.values_mut()
    }

    /// Links whose target is an input of `node`, in creation order.
    pub fn links_into(&self, node: NodeId) -> impl Iterator<Item = &PropertyLink> {
        self.incoming
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.links.get(id))
    }

    /// Whether `node` is an endpoint of at least one link.
    pub fn is_linked(&self, node: NodeId) -> bool {
        self.incoming.contains_key(&node) || self.outgoing.contains_key(&node)
    }

    /// Node-level edges induced by strong links, `(source, target)`.
    pub fn strong_edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.links
            .values()
            .filter(|l| !l.weak)
            .map(|l| (l.source_node(), l.target_node()))
    }

    /// Revision counter of the strong edge set.
    pub fn strong_revision(&self) -> u64 {
        self.strong_revision
    }

    /// Get the number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether there are no links.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

fn detach(index: &mut HashMap<NodeId, SmallVec<[LinkId; 4]>>, node: NodeId, id: LinkId) {
    if let Some(ids) = index.get_mut(&node) {
        ids.retain(|other| *other != id);
        if ids.is_empty() {
            index.remove(&node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::handle::{EngineId, NodeHandle};

    fn prop(engine: EngineId, node: u32, direction: Direction, slot: u32) -> PropertyHandle {
        PropertyHandle::new(
            NodeHandle::new(engine, NodeId::from_parts(node, 0)),
            direction,
            slot,
        )
    }

    fn endpoint(handle: PropertyHandle, kind: PropertyKind) -> Endpoint {
        Endpoint { handle, kind }
    }

    #[test]
    fn link_and_unlink() {
        let engine = EngineId::new();
        let mut graph = LinkGraph::new();
        let out = prop(engine, 0, Direction::Output, 1);
        let input = prop(engine, 1, Direction::Input, 1);

        let id = graph
            .link(
                endpoint(out, PropertyKind::Float),
                endpoint(input, PropertyKind::Float),
                false,
                Value::Float(0.0),
            )
            .unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.incoming(input).map(|l| l.id()), Some(id));
        assert!(graph.is_linked(NodeId::from_parts(0, 0)));
        assert_eq!(graph.strong_edges().count(), 1);

        let revision = graph.strong_revision();
        graph.unlink(out, input).unwrap();
        assert!(graph.is_empty());
        assert!(graph.strong_revision() > revision);
        assert_eq!(graph.unlink(out, input).unwrap_err(), LinkError::NotLinked);
    }

    #[test]
    fn structural_rules_are_enforced() {
        let engine = EngineId::new();
        let mut graph = LinkGraph::new();
        let out = prop(engine, 0, Direction::Output, 1);
        let input = prop(engine, 1, Direction::Input, 1);
        let own_input = prop(engine, 0, Direction::Input, 1);
        let foreign = prop(EngineId::new(), 1, Direction::Input, 1);
        let f = PropertyKind::Float;

        let attempts = [
            (endpoint(input, f), endpoint(out, f), LinkError::SourceNotOutput),
            (endpoint(out, f), endpoint(out, f), LinkError::TargetNotInput),
            (endpoint(out, f), endpoint(own_input, f), LinkError::SameNode),
            (endpoint(out, f), endpoint(foreign, f), LinkError::ForeignEndpoint),
            (
                endpoint(out, PropertyKind::Struct),
                endpoint(input, PropertyKind::Struct),
                LinkError::ContainerLink(PropertyKind::Struct),
            ),
            (
                endpoint(out, PropertyKind::Int64),
                endpoint(input, PropertyKind::Int32),
                LinkError::TypeMismatch {
                    from: PropertyKind::Int64,
                    to: PropertyKind::Int32,
                },
            ),
        ];
        for (source, target, expected) in attempts {
            let err = graph.link(source, target, false, Value::Float(0.0)).unwrap_err();
            assert_eq!(err, expected);
        }
        assert!(graph.is_empty());
    }

    #[test]
    fn target_accepts_one_link_source_many() {
        let engine = EngineId::new();
        let mut graph = LinkGraph::new();
        let out = prop(engine, 0, Direction::Output, 1);
        let other_out = prop(engine, 2, Direction::Output, 1);
        let in_a = prop(engine, 1, Direction::Input, 1);
        let in_b = prop(engine, 1, Direction::Input, 2);
        let b = PropertyKind::Bool;

        graph.link(endpoint(out, b), endpoint(in_a, b), false, Value::Bool(false)).unwrap();
        graph.link(endpoint(out, b), endpoint(in_b, b), true, Value::Bool(false)).unwrap();
        let err = graph
            .link(endpoint(other_out, b), endpoint(in_a, b), false, Value::Bool(false))
            .unwrap_err();
        assert_eq!(err, LinkError::AlreadyLinked);
        assert_eq!(graph.len(), 2);
        // Weak links induce no ordering edge.
        assert_eq!(graph.strong_edges().count(), 1);
    }

    #[test]
    fn unlink_requires_matching_source() {
        let engine = EngineId::new();
        let mut graph = LinkGraph::new();
        let out = prop(engine, 0, Direction::Output, 1);
        let other_out = prop(engine, 2, Direction::Output, 1);
        let input = prop(engine, 1, Direction::Input, 1);
        let i = PropertyKind::Int32;

        graph.link(endpoint(out, i), endpoint(input, i), false, Value::Int32(0)).unwrap();
        assert_eq!(graph.unlink(other_out, input).unwrap_err(), LinkError::NotLinked);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn remove_node_drops_incident_links() {
        let engine = EngineId::new();
        let mut graph = LinkGraph::new();
        let a_out = prop(engine, 0, Direction::Output, 1);
        let b_in = prop(engine, 1, Direction::Input, 1);
        let b_out = prop(engine, 1, Direction::Output, 1);
        let c_in = prop(engine, 2, Direction::Input, 1);
        let s = PropertyKind::String;
        let empty = Value::String(String::new());

        graph.link(endpoint(a_out, s), endpoint(b_in, s), false, empty.clone()).unwrap();
        graph.link(endpoint(b_out, s), endpoint(c_in, s), true, empty).unwrap();

        assert_eq!(graph.remove_node(NodeId::from_parts(1, 0)), 2);
        assert!(graph.is_empty());
        assert!(graph.incoming(b_in).is_none());
        assert!(graph.incoming(c_in).is_none());
        for node in 0..3 {
            assert!(!graph.is_linked(NodeId::from_parts(node, 0)));
        }
    }

    #[test]
    fn links_into_follows_node_index() {
        let engine = EngineId::new();
        let mut graph = LinkGraph::new();
        let a_out = prop(engine, 0, Direction::Output, 1);
        let c_out = prop(engine, 2, Direction::Output, 1);
        let b_in_1 = prop(engine, 1, Direction::Input, 1);
        let b_in_2 = prop(engine, 1, Direction::Input, 2);
        let c_in = prop(engine, 2, Direction::Input, 1);
        let i = PropertyKind::Int32;
        let zero = Value::Int32(0);

        let first = graph.link(endpoint(a_out, i), endpoint(b_in_1, i), false, zero.clone()).unwrap();
        graph.link(endpoint(a_out, i), endpoint(c_in, i), false, zero.clone()).unwrap();
        let second = graph.link(endpoint(c_out, i), endpoint(b_in_2, i), true, zero).unwrap();

        let b = NodeId::from_parts(1, 0);
        let into_b: Vec<LinkId> = graph.links_into(b).map(|l| l.id()).collect();
        assert_eq!(into_b, [first, second]);

        graph.unlink(a_out, b_in_1).unwrap();
        let into_b: Vec<LinkId> = graph.links_into(b).map(|l| l.id()).collect();
        assert_eq!(into_b, [second]);
        assert!(graph.is_linked(NodeId::from_parts(0, 0)));

        graph.remove_node(NodeId::from_parts(2, 0));
        assert_eq!(graph.links_into(b).count(), 0);
        assert!(!graph.is_linked(b));
        assert!(!graph.is_linked(NodeId::from_parts(0, 0)));
    }
}
