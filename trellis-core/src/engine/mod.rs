//! Logic Engine
//!
//! The engine owns every node, link and scene object of one logic graph, and
//! is the only way to reach them.
//!
//! # Overview
//!
//! - Nodes are created from a `NodeConfig` and addressed by `NodeHandle`s.
//! - Properties are addressed by `PropertyHandle`s obtained by navigating
//!   from a node's input or output root.
//! - Links connect output leaves to input leaves and are checked on creation.
//! - `tick` runs every node whose inputs changed, in dependency order.
//! - `save` and `load` persist the whole graph.
//!
//! # Error Reporting
//!
//! Fallible calls return a `Result`. In addition, every public call that may
//! change the engine clears the error list on entry and records the errors it
//! produced, so `errors()` always describes the most recent such call.

mod config;
mod executor;
mod persistence;
mod report;

pub use config::EngineConfig;
pub use report::UpdateReport;

use tracing::{debug, warn};

use crate::error::{EngineError, ErrorReport, LinkError, StructuralError};
use crate::graph::{Endpoint, LinkGraph, LinkId, PropertyLink, SchedulerNode, TopologicalScheduler};
use crate::node::handle::{Direction, EngineId, NodeHandle, PropertyHandle};
use crate::node::{
    AnimationChannel, LogicNode, NodeArena, NodeConfig, ScriptDefinition, ScriptRegistry,
};
use crate::property::{PropertyKind, PropertyTree, PropertyValue, TreeValue, TypeSpec, Value};
use crate::scene::{SceneObjectId, SceneState};

/// A graph of logic nodes connected by property links.
#[derive(Debug)]
pub struct LogicEngine {
    id: EngineId,
    config: EngineConfig,
    nodes: NodeArena,
    links: LinkGraph,
    scheduler: TopologicalScheduler,
    scripts: ScriptRegistry,
    scene: SceneState,

    /// Errors of the most recent mutating call.
    errors: Vec<ErrorReport>,

    /// Report of the most recent tick, if collection is enabled.
    last_report: Option<UpdateReport>,

    /// Creation sequence number handed to the next node.
    next_sequence: u64,
}

impl Default for LogicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicEngine {
    /// Create an empty engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an empty engine.
    pub fn with_config(config: EngineConfig) -> Self {
        let id = EngineId::new();
        debug!(engine = id.raw(), ?config, "created logic engine");
        Self {
            id,
            config,
            nodes: NodeArena::new(),
            links: LinkGraph::new(),
            scheduler: TopologicalScheduler::new(),
            scripts: ScriptRegistry::new(),
            scene: SceneState::new(),
            errors: Vec::new(),
            last_report: None,
            next_sequence: 0,
        }
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect on the next tick.
    pub fn set_config(&mut self, config: EngineConfig) {
        if !config.collect_update_report {
            self.last_report = None;
        }
        self.config = config;
    }

    // ------------------------------------------------------------------
    // Error list
    // ------------------------------------------------------------------

    /// Errors produced by the most recent mutating call.
    pub fn errors(&self) -> &[ErrorReport] {
        &self.errors
    }

    fn push_error(&mut self, error: &EngineError, node: Option<NodeHandle>) {
        self.errors.push(ErrorReport::new(error, node));
    }

    /// Replace the error list with the outcome of one call.
    fn record<T>(
        &mut self,
        result: Result<T, EngineError>,
        node: Option<NodeHandle>,
    ) -> Result<T, EngineError> {
        self.errors.clear();
        if let Err(err) = &result {
            debug!(error = %err, "engine call failed");
            self.push_error(err, node);
        }
        result
    }

    // ------------------------------------------------------------------
    // Scripts and scene
    // ------------------------------------------------------------------

    /// Register a script definition so nodes can be created from it.
    pub fn register_script(&mut self, definition: ScriptDefinition) -> Result<(), EngineError> {
        let name = definition.name().to_string();
        let result = self.scripts.register(definition).map_err(EngineError::from);
        if result.is_ok() {
            debug!(script = %name, "registered script definition");
        }
        self.record(result, None)
    }

    pub fn scripts(&self) -> &ScriptRegistry {
        &self.scripts
    }

    /// The scene state binding nodes write to.
    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneState {
        &mut self.scene
    }

    // ------------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------------

    /// Create a node. It starts dirty and runs on the next tick.
    pub fn create_node(
        &mut self,
        name: impl Into<String>,
        config: NodeConfig,
    ) -> Result<NodeHandle, EngineError> {
        let result = self.create_node_inner(name.into(), config);
        self.record(result, None)
    }

    fn create_node_inner(
        &mut self,
        name: String,
        config: NodeConfig,
    ) -> Result<NodeHandle, EngineError> {
        let sequence = self.next_sequence;
        let node = LogicNode::from_config(name, config, &self.scripts, &self.scene, sequence)?;
        self.next_sequence += 1;

        let kind = node.kind().name();
        let id = self.nodes.insert(node);
        self.scheduler.invalidate();
        debug!(node = %id, kind, sequence, "created node");
        Ok(NodeHandle::new(self.id, id))
    }

    /// Create a node running the registered script `definition`.
    pub fn create_script(
        &mut self,
        name: impl Into<String>,
        definition: impl Into<String>,
    ) -> Result<NodeHandle, EngineError> {
        self.create_node(
            name,
            NodeConfig::Script {
                definition: definition.into(),
            },
        )
    }

    /// Create a timer node.
    pub fn create_timer(&mut self, name: impl Into<String>) -> Result<NodeHandle, EngineError> {
        self.create_node(name, NodeConfig::Timer { last_ticker: None })
    }

    /// Create a binding node writing to `object` through `interface`.
    pub fn create_binding(
        &mut self,
        name: impl Into<String>,
        object: SceneObjectId,
        interface: TypeSpec,
    ) -> Result<NodeHandle, EngineError> {
        self.create_node(name, NodeConfig::Binding { object, interface })
    }

    /// Create an animation node sampling `channels`.
    pub fn create_animation(
        &mut self,
        name: impl Into<String>,
        channels: Vec<AnimationChannel>,
    ) -> Result<NodeHandle, EngineError> {
        self.create_node(name, NodeConfig::Animation { channels })
    }

    /// Destroy a node and every link touching it.
    ///
    /// Nodes on the other end of removed links keep their current values and
    /// are not marked dirty.
    pub fn destroy(&mut self, node: NodeHandle) -> Result<(), EngineError> {
        let result = self.destroy_inner(node);
        self.record(result, Some(node))
    }

    fn destroy_inner(&mut self, node: NodeHandle) -> Result<(), EngineError> {
        self.resolve_node(node)?;
        let removed_links = self.links.remove_node(node.id());
        self.nodes.remove(node.id());
        self.scheduler.invalidate();
        if let Some(report) = self.last_report.as_mut() {
            report.forget(node);
        }
        debug!(node = %node.id(), removed_links, "destroyed node");
        Ok(())
    }

    /// Get the number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Handles of all live nodes in creation order.
    pub fn nodes(&self) -> Vec<NodeHandle> {
        self.nodes
            .ids_in_creation_order()
            .into_iter()
            .map(|id| NodeHandle::new(self.id, id))
            .collect()
    }

    /// Get a node by handle.
    pub fn node(&self, node: NodeHandle) -> Result<&LogicNode, EngineError> {
        Ok(self.resolve_node(node)?)
    }

    pub fn node_name(&self, node: NodeHandle) -> Result<&str, EngineError> {
        Ok(self.resolve_node(node)?.name())
    }

    /// The first node, in creation order, called `name`.
    pub fn find_node(&self, name: &str) -> Option<NodeHandle> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.name() == name)
            .min_by_key(|(_, node)| node.sequence())
            .map(|(id, _)| NodeHandle::new(self.id, id))
    }

    fn resolve_node(&self, node: NodeHandle) -> Result<&LogicNode, StructuralError> {
        if node.engine() != self.id {
            return Err(StructuralError::ForeignHandle);
        }
        self.nodes
            .get(node.id())
            .ok_or(StructuralError::UnknownNode(node))
    }

    fn resolve_node_mut(&mut self, node: NodeHandle) -> Result<&mut LogicNode, StructuralError> {
        if node.engine() != self.id {
            return Err(StructuralError::ForeignHandle);
        }
        self.nodes
            .get_mut(node.id())
            .ok_or(StructuralError::UnknownNode(node))
    }

    // ------------------------------------------------------------------
    // Property access
    // ------------------------------------------------------------------

    /// Resolve a property handle to its tree.
    fn resolve_tree(&self, prop: PropertyHandle) -> Result<&PropertyTree, StructuralError> {
        let tree = self
            .resolve_node(prop.node())?
            .tree(prop.direction())
            .ok_or(StructuralError::UnknownProperty)?;
        if !tree.contains(prop.slot()) {
            return Err(StructuralError::UnknownProperty);
        }
        Ok(tree)
    }

    fn root(&self, node: NodeHandle, direction: Direction, path: &str) -> Result<PropertyHandle, EngineError> {
        let tree = self
            .resolve_node(node)?
            .tree(direction)
            .ok_or(StructuralError::UnknownProperty)?;
        let slot = tree.find(path)?;
        Ok(PropertyHandle::new(node, direction, slot))
    }

    /// Get an input property by dotted path. The empty path is the root.
    pub fn input(&self, node: NodeHandle, path: &str) -> Result<PropertyHandle, EngineError> {
        self.root(node, Direction::Input, path)
    }

    /// Get an output property by dotted path. The empty path is the root.
    pub fn output(&self, node: NodeHandle, path: &str) -> Result<PropertyHandle, EngineError> {
        self.root(node, Direction::Output, path)
    }

    /// Get a named child of a struct, or an element of an array by its
    /// decimal index.
    pub fn child(&self, prop: PropertyHandle, name: &str) -> Result<PropertyHandle, EngineError> {
        let slot = self.resolve_tree(prop)?.child(prop.slot(), name)?;
        Ok(PropertyHandle::new(prop.node(), prop.direction(), slot))
    }

    /// Get a child by position.
    pub fn child_at(&self, prop: PropertyHandle, index: usize) -> Result<PropertyHandle, EngineError> {
        let slot = self.resolve_tree(prop)?.child_at(prop.slot(), index)?;
        Ok(PropertyHandle::new(prop.node(), prop.direction(), slot))
    }

    pub fn child_count(&self, prop: PropertyHandle) -> Result<usize, EngineError> {
        Ok(self.resolve_tree(prop)?.child_count(prop.slot())?)
    }

    pub fn kind(&self, prop: PropertyHandle) -> Result<PropertyKind, EngineError> {
        Ok(self.resolve_tree(prop)?.kind(prop.slot())?)
    }

    /// Name of a property. Array elements are named by their index; roots
    /// have an empty name.
    pub fn property_name(&self, prop: PropertyHandle) -> Result<&str, EngineError> {
        Ok(self.resolve_tree(prop)?.name(prop.slot())?)
    }

    /// Dotted path of a property from its tree's root.
    pub fn property_path(&self, prop: PropertyHandle) -> Result<String, EngineError> {
        Ok(self.resolve_tree(prop)?.path(prop.slot())?)
    }

    /// Current value of a leaf.
    pub fn value(&self, prop: PropertyHandle) -> Result<&Value, EngineError> {
        Ok(self.resolve_tree(prop)?.value(prop.slot())?)
    }

    /// Current value of a leaf as a Rust type.
    ///
    /// Fails with a type mismatch if `T` does not match the leaf's kind.
    pub fn get<T: PropertyValue>(&self, prop: PropertyHandle) -> Result<T, EngineError> {
        let value = self.value(prop)?;
        T::from_value(value).ok_or_else(|| {
            StructuralError::TypeMismatch {
                expected: value.kind(),
                actual: T::KIND,
            }
            .into()
        })
    }

    /// Whether a leaf was written since its node last ran.
    pub fn was_set(&self, prop: PropertyHandle) -> Result<bool, EngineError> {
        Ok(self.resolve_tree(prop)?.was_set(prop.slot()))
    }

    /// The link feeding an input leaf, if any.
    pub fn incoming_link(&self, prop: PropertyHandle) -> Option<&PropertyLink> {
        self.links.incoming(prop)
    }

    /// Write an input leaf.
    ///
    /// The write always marks the leaf as set and the node dirty, even if the
    /// value is unchanged. Outputs and linked inputs cannot be written.
    pub fn set(&mut self, prop: PropertyHandle, value: impl Into<Value>) -> Result<(), EngineError> {
        let result = self.set_inner(prop, value.into());
        self.record(result, Some(prop.node()))
    }

    fn set_inner(&mut self, prop: PropertyHandle, value: Value) -> Result<(), EngineError> {
        self.resolve_tree(prop)?;
        if prop.direction() == Direction::Output {
            return Err(StructuralError::ReadOnlyOutput.into());
        }
        if self.links.incoming(prop).is_some() {
            return Err(LinkError::InputIsLinked.into());
        }
        let node = self.resolve_node_mut(prop.node())?;
        node.tree_mut(prop.direction())
            .ok_or(StructuralError::UnknownProperty)?
            .set_value(prop.slot(), value)?;
        node.mark_dirty();
        Ok(())
    }

    /// Write a whole subtree at once.
    ///
    /// Struct values may name a subset of the fields; array values may cover
    /// a prefix of the elements. Children are written in order and the first
    /// failure stops the assignment, leaving earlier writes in place.
    pub fn assign(&mut self, prop: PropertyHandle, value: impl Into<TreeValue>) -> Result<(), EngineError> {
        let result = self.assign_inner(prop, value.into());
        self.record(result, Some(prop.node()))
    }

    fn assign_inner(&mut self, prop: PropertyHandle, value: TreeValue) -> Result<(), EngineError> {
        match value {
            TreeValue::Leaf(value) => self.set_inner(prop, value),
            TreeValue::Struct(fields) => {
                self.expect_container(prop, PropertyKind::Struct)?;
                for (name, field) in fields {
                    let child = self.child(prop, &name)?;
                    self.assign_inner(child, field)?;
                }
                Ok(())
            }
            TreeValue::Array(elements) => {
                self.expect_container(prop, PropertyKind::Array)?;
                for (index, element) in elements.into_iter().enumerate() {
                    let child = self.child_at(prop, index)?;
                    self.assign_inner(child, element)?;
                }
                Ok(())
            }
        }
    }

    /// Check that a subtree value of shape `shape` fits the property.
    fn expect_container(&self, prop: PropertyHandle, shape: PropertyKind) -> Result<(), EngineError> {
        let kind = self.kind(prop)?;
        if kind != shape {
            return Err(StructuralError::TypeMismatch {
                expected: kind,
                actual: shape,
            }
            .into());
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Link an output leaf to an input leaf.
    ///
    /// The target takes the source's value on every tick, after the source's
    /// node has run.
    pub fn link(&mut self, source: PropertyHandle, target: PropertyHandle) -> Result<LinkId, EngineError> {
        let result = self.link_inner(source, target, false);
        self.record(result, Some(target.node()))
    }

    /// Link an output leaf to an input leaf without ordering constraint.
    ///
    /// The target receives the source's value as of the end of the previous
    /// tick, which allows closing feedback loops.
    pub fn link_weak(&mut self, source: PropertyHandle, target: PropertyHandle) -> Result<LinkId, EngineError> {
        let result = self.link_inner(source, target, true);
        self.record(result, Some(target.node()))
    }

    fn link_inner(
        &mut self,
        source: PropertyHandle,
        target: PropertyHandle,
        weak: bool,
    ) -> Result<LinkId, EngineError> {
        if source.node().engine() != self.id || target.node().engine() != self.id {
            return Err(LinkError::ForeignEndpoint.into());
        }
        if source.direction() != Direction::Output
            || self.resolve_node(source.node())?.outputs().is_none()
        {
            return Err(LinkError::SourceNotOutput.into());
        }
        if target.direction() != Direction::Input
            || self.resolve_node(target.node())?.inputs().is_none()
        {
            return Err(LinkError::TargetNotInput.into());
        }
        let source_tree = self.resolve_tree(source)?;
        let source = Endpoint {
            handle: source,
            kind: source_tree.kind(source.slot())?,
        };
        let target = Endpoint {
            handle: target,
            kind: self.resolve_tree(target)?.kind(target.slot())?,
        };
        self.links.validate(&source, &target)?;

        let initial = source_tree.value(source.handle.slot())?.clone();
        let id = self.links.link(source, target, weak, initial)?;

        for node in [source.handle.node(), target.handle.node()] {
            if let Ok(node) = self.resolve_node_mut(node) {
                node.mark_dirty();
            }
        }
        debug!(
            link = id.raw(),
            source = %source.handle.node().id(),
            target = %target.handle.node().id(),
            weak,
            "linked properties"
        );
        Ok(id)
    }

    /// Remove the link from `source` to `target`.
    ///
    /// The target keeps the last value it received.
    pub fn unlink(&mut self, source: PropertyHandle, target: PropertyHandle) -> Result<(), EngineError> {
        let result = self.unlink_inner(source, target);
        self.record(result, Some(target.node()))
    }

    fn unlink_inner(&mut self, source: PropertyHandle, target: PropertyHandle) -> Result<(), EngineError> {
        if source.node().engine() != self.id || target.node().engine() != self.id {
            return Err(LinkError::ForeignEndpoint.into());
        }
        let link = self.links.unlink(source, target)?;
        debug!(link = link.id().raw(), weak = link.is_weak(), "unlinked properties");
        Ok(())
    }

    /// Whether a node is an endpoint of any link.
    pub fn is_linked(&self, node: NodeHandle) -> bool {
        node.engine() == self.id && self.links.is_linked(node.id())
    }

    /// All links in creation order.
    pub fn links(&self) -> impl Iterator<Item = &PropertyLink> {
        self.links.links()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    // ------------------------------------------------------------------
    // Scheduling and diagnostics
    // ------------------------------------------------------------------

    fn scheduler_nodes(&self) -> Vec<SchedulerNode> {
        self.nodes
            .iter()
            .map(|(id, node)| SchedulerNode {
                id,
                sequence: node.sequence(),
            })
            .collect()
    }

    /// The order the next tick will visit nodes in.
    pub fn execution_order(&mut self) -> Result<Vec<NodeHandle>, EngineError> {
        let nodes = self.scheduler_nodes();
        let engine = self.id;
        let order = self.scheduler.order(&nodes, &self.links)?;
        Ok(order.iter().map(|&id| NodeHandle::new(engine, id)).collect())
    }

    /// Report of the most recent tick.
    ///
    /// Only available when `collect_update_report` is enabled.
    pub fn last_update_report(&self) -> Option<&UpdateReport> {
        self.last_report.as_ref()
    }

    fn warn_cycle(&self, error: &EngineError) {
        warn!(engine = self.id.raw(), error = %error, "cannot order nodes");
    }
}
