//! Logic Nodes
//!
//! This module defines the units of computation that live in an engine.
//!
//! # Overview
//!
//! A `LogicNode` owns up to two property trees (inputs and outputs), a dirty
//! flag, and a `NodeKind` that implements its update. Node kinds form a
//! closed set:
//!
//! - `Script`: runs a registered user function
//! - `Binding`: forwards written inputs into a scene object
//! - `Timer`: publishes a time ticker, runs every tick
//! - `Animation`: samples keyframe channels at a progress input
//!
//! The scheduler and executor never look inside a kind; they only call
//! `update` through the enum.

pub mod handle;

mod animation;
mod arena;
mod binding;
mod script;
mod timer;

pub use animation::{AnimationChannel, AnimationNode, Interpolation};
pub use arena::NodeArena;
pub use binding::BindingNode;
pub use script::{ScriptDefinition, ScriptFn, ScriptNode, ScriptRegistry};
pub use timer::TimerNode;

use serde::{Deserialize, Serialize};

use crate::error::StructuralError;
use crate::property::{PropertyTree, TypeSpec};
use crate::scene::{SceneObjectId, SceneState};

/// How to create a node. Also what gets persisted for each node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeConfig {
    /// An instance of the registered script definition with this name.
    Script { definition: String },
    /// A binding writing to `object`, with the given input interface.
    Binding {
        object: SceneObjectId,
        interface: TypeSpec,
    },
    /// A time ticker. `last_ticker` is the last caller-provided ticker
    /// value, so a reloaded timer still rejects time going backwards.
    Timer {
        #[serde(default)]
        last_ticker: Option<i64>,
    },
    /// A keyframe animation.
    Animation { channels: Vec<AnimationChannel> },
}

/// The closed set of node behaviours.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Script(ScriptNode),
    Binding(BindingNode),
    Timer(TimerNode),
    Animation(AnimationNode),
}

impl NodeKind {
    /// Short name of the kind, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Script(_) => "script",
            Self::Binding(_) => "binding",
            Self::Timer(_) => "timer",
            Self::Animation(_) => "animation",
        }
    }

    /// Whether the node runs on every tick regardless of its inputs.
    pub fn always_dirty(&self) -> bool {
        matches!(self, Self::Timer(_))
    }

    /// The configuration that recreates this kind.
    pub fn config(&self, inputs: Option<&PropertyTree>) -> NodeConfig {
        match self {
            Self::Script(script) => NodeConfig::Script {
                definition: script.definition_name().to_string(),
            },
            Self::Binding(binding) => NodeConfig::Binding {
                object: binding.object(),
                interface: inputs.map(tree_spec).unwrap_or_else(TypeSpec::empty),
            },
            Self::Timer(timer) => NodeConfig::Timer {
                last_ticker: timer.last_ticker(),
            },
            Self::Animation(animation) => NodeConfig::Animation {
                channels: animation.channels().to_vec(),
            },
        }
    }

    /// Run the node's update over its trees.
    pub(crate) fn update(
        &mut self,
        inputs: Option<&PropertyTree>,
        outputs: Option<&mut PropertyTree>,
        scene: &mut SceneState,
    ) -> Result<(), String> {
        match self {
            Self::Script(script) => script.update(inputs, outputs),
            Self::Binding(binding) => binding.update(inputs, scene),
            Self::Timer(timer) => timer.update(inputs, outputs),
            Self::Animation(animation) => animation.update(inputs, outputs),
        }
    }
}

/// Rebuild the declaration of an existing tree.
fn tree_spec(tree: &PropertyTree) -> TypeSpec {
    fn spec_at(tree: &PropertyTree, slot: u32) -> TypeSpec {
        match tree.kind(slot) {
            Ok(kind) if kind.is_leaf() => TypeSpec::Leaf(kind),
            Ok(crate::property::PropertyKind::Array) => {
                let children = tree.children(slot).unwrap_or_default();
                let element = children
                    .first()
                    .map(|&c| spec_at(tree, c))
                    .unwrap_or_else(TypeSpec::empty);
                TypeSpec::array(children.len(), element)
            }
            _ => TypeSpec::Struct(
                tree.children(slot)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|c| {
                        let name = tree.name(c).unwrap_or_default().to_string();
                        (name, spec_at(tree, c))
                    })
                    .collect(),
            ),
        }
    }
    spec_at(tree, PropertyTree::ROOT)
}

/// A unit of computation with typed inputs and outputs.
#[derive(Debug, Clone)]
pub struct LogicNode {
    name: String,
    kind: NodeKind,
    inputs: Option<PropertyTree>,
    outputs: Option<PropertyTree>,

    /// Inputs changed since the last execution.
    dirty: bool,

    /// Whether the node has run at least once.
    executed: bool,

    /// Creation sequence number, used to order unconstrained nodes.
    sequence: u64,
}

impl LogicNode {
    /// Create a node from already-built parts. New nodes start dirty.
    pub fn new(
        name: impl Into<String>,
        kind: NodeKind,
        inputs: Option<PropertyTree>,
        outputs: Option<PropertyTree>,
        sequence: u64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs,
            outputs,
            dirty: true,
            executed: false,
            sequence,
        }
    }

    /// Build a node, its kind and its property trees from a configuration.
    pub fn from_config(
        name: impl Into<String>,
        config: NodeConfig,
        scripts: &ScriptRegistry,
        scene: &SceneState,
        sequence: u64,
    ) -> Result<Self, StructuralError> {
        let name = name.into();
        let node = match config {
            NodeConfig::Script { definition } => {
                let definition = scripts
                    .get(&definition)
                    .ok_or(StructuralError::UnknownScript(definition))?
                    .clone();
                let inputs = PropertyTree::build(definition.inputs())?;
                let outputs = PropertyTree::build(definition.outputs())?;
                let kind = NodeKind::Script(ScriptNode::new(definition));
                Self::new(name, kind, Some(inputs), Some(outputs), sequence)
            }
            NodeConfig::Binding { object, interface } => {
                if !matches!(interface, TypeSpec::Struct(_)) {
                    return Err(StructuralError::InvalidInterface(
                        "binding interface must be a struct".to_string(),
                    ));
                }
                let binding = BindingNode::new(object);
                let mut inputs = PropertyTree::build(&interface)?;
                binding.initialize_inputs(&mut inputs, scene)?;
                Self::new(name, NodeKind::Binding(binding), Some(inputs), None, sequence)
            }
            NodeConfig::Timer { last_ticker } => {
                let (inputs, outputs) = TimerNode::interface();
                Self::new(
                    name,
                    NodeKind::Timer(TimerNode::resumed(last_ticker)),
                    Some(PropertyTree::build(&inputs)?),
                    Some(PropertyTree::build(&outputs)?),
                    sequence,
                )
            }
            NodeConfig::Animation { channels } => {
                let (animation, inputs, outputs) = AnimationNode::new(channels)?;
                let inputs = PropertyTree::build(&inputs)?;
                let mut outputs = PropertyTree::build(&outputs)?;
                animation.initialize_outputs(&mut outputs)?;
                Self::new(
                    name,
                    NodeKind::Animation(animation),
                    Some(inputs),
                    Some(outputs),
                    sequence,
                )
            }
        };
        Ok(node)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> Option<&PropertyTree> {
        self.inputs.as_ref()
    }

    pub fn outputs(&self) -> Option<&PropertyTree> {
        self.outputs.as_ref()
    }

    pub(crate) fn inputs_mut(&mut self) -> Option<&mut PropertyTree> {
        self.inputs.as_mut()
    }

    /// The tree on the given side.
    pub fn tree(&self, direction: handle::Direction) -> Option<&PropertyTree> {
        match direction {
            handle::Direction::Input => self.inputs.as_ref(),
            handle::Direction::Output => self.outputs.as_ref(),
        }
    }

    pub(crate) fn tree_mut(&mut self, direction: handle::Direction) -> Option<&mut PropertyTree> {
        match direction {
            handle::Direction::Input => self.inputs.as_mut(),
            handle::Direction::Output => self.outputs.as_mut(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn has_executed(&self) -> bool {
        self.executed
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether the node must run this tick.
    pub fn needs_update(&self) -> bool {
        !self.executed || self.dirty || self.kind.always_dirty()
    }

    /// Run the update and settle flags: inputs are consumed even if the
    /// update fails, so a failing node is not retried until its inputs change.
    pub(crate) fn execute(&mut self, scene: &mut SceneState) -> Result<(), String> {
        let result = self
            .kind
            .update(self.inputs.as_ref(), self.outputs.as_mut(), scene);
        if let Some(inputs) = self.inputs.as_mut() {
            inputs.clear_set_flags();
        }
        if let Some(outputs) = self.outputs.as_mut() {
            outputs.clear_set_flags();
        }
        self.dirty = false;
        self.executed = true;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyKind, Value};

    fn registry() -> ScriptRegistry {
        let mut registry = ScriptRegistry::new();
        registry
            .register(ScriptDefinition::new(
                "negate",
                TypeSpec::structure([("in", TypeSpec::leaf(PropertyKind::Bool))]),
                TypeSpec::structure([("out", TypeSpec::leaf(PropertyKind::Bool))]),
                |inputs, outputs| outputs.set("out", !inputs.get::<bool>("in")?),
            ))
            .unwrap();
        registry
    }

    #[test]
    fn new_nodes_start_dirty_and_unexecuted() {
        let node = LogicNode::from_config(
            "n",
            NodeConfig::Script {
                definition: "negate".to_string(),
            },
            &registry(),
            &SceneState::new(),
            0,
        )
        .unwrap();
        assert!(node.is_dirty());
        assert!(!node.has_executed());
        assert!(node.needs_update());
        assert_eq!(node.kind().name(), "script");
    }

    #[test]
    fn execute_consumes_inputs() {
        let mut scene = SceneState::new();
        let mut node = LogicNode::from_config(
            "n",
            NodeConfig::Script {
                definition: "negate".to_string(),
            },
            &registry(),
            &scene,
            0,
        )
        .unwrap();

        node.execute(&mut scene).unwrap();
        assert!(!node.needs_update());
        let outputs = node.outputs().unwrap();
        assert_eq!(outputs.value(outputs.find("out").unwrap()).unwrap(), &Value::Bool(true));
    }

    #[test]
    fn unknown_script_is_rejected() {
        let err = LogicNode::from_config(
            "n",
            NodeConfig::Script {
                definition: "missing".to_string(),
            },
            &registry(),
            &SceneState::new(),
            0,
        )
        .unwrap_err();
        assert_eq!(err, StructuralError::UnknownScript("missing".to_string()));
    }

    #[test]
    fn timers_are_always_dirty() {
        let mut scene = SceneState::new();
        let mut node = LogicNode::from_config(
            "t",
            NodeConfig::Timer { last_ticker: None },
            &ScriptRegistry::new(),
            &scene,
            0,
        )
        .unwrap();
        node.execute(&mut scene).unwrap();
        assert!(node.needs_update());
    }

    #[test]
    fn binding_config_round_trips_interface() {
        let mut scene = SceneState::new();
        let object = scene.create_object("cube");
        let interface = TypeSpec::structure([
            ("visible", TypeSpec::leaf(PropertyKind::Bool)),
            ("offsets", TypeSpec::array(2, TypeSpec::leaf(PropertyKind::Vec2f))),
        ]);
        let config = NodeConfig::Binding {
            object,
            interface: interface.clone(),
        };
        let node =
            LogicNode::from_config("b", config.clone(), &ScriptRegistry::new(), &scene, 0).unwrap();
        assert!(node.outputs().is_none());
        assert_eq!(node.kind().config(node.inputs()), config);
    }
}
