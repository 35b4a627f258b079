//! Trellis Core
//!
//! This crate provides the runtime for Trellis logic graphs: nodes with typed
//! input and output properties, connected by links, updated incrementally in
//! dependency order.
//!
//! It implements:
//!
//! - Hierarchical, strongly-typed property trees
//! - Strong and weak (one-tick lagged) property links
//! - Deterministic topological scheduling with cycle detection
//! - Dirty tracking, so only nodes whose inputs changed are re-run
//! - Script, binding, timer and animation nodes
//! - Saving and loading whole graphs
//!
//! # Architecture
//!
//! - `property`: type declarations, values and property trees
//! - `node`: handles, node kinds and node storage
//! - `graph`: the link graph and the topological scheduler
//! - `scene`: the external state binding nodes write to
//! - `engine`: the `LogicEngine` tying everything together
//! - `error`: error types and error reports
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::{LogicEngine, PropertyKind, ScriptDefinition, TypeSpec};
//!
//! let mut engine = LogicEngine::new();
//! engine.register_script(ScriptDefinition::new(
//!     "double",
//!     TypeSpec::structure([("x", TypeSpec::leaf(PropertyKind::Int32))]),
//!     TypeSpec::structure([("y", TypeSpec::leaf(PropertyKind::Int32))]),
//!     |inputs, outputs| outputs.set("y", inputs.get::<i32>("x")? * 2),
//! ))?;
//!
//! let first = engine.create_script("first", "double")?;
//! let second = engine.create_script("second", "double")?;
//! engine.link(engine.output(first, "y")?, engine.input(second, "x")?)?;
//!
//! engine.set(engine.input(first, "x")?, 3)?;
//! assert!(engine.tick());
//! assert_eq!(engine.get::<i32>(engine.output(second, "y")?)?, 12);
//! ```

pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod property;
pub mod scene;

pub use engine::{EngineConfig, LogicEngine, UpdateReport};
pub use error::{
    CycleError, EngineError, ErrorKind, ErrorReport, LinkError, PersistenceError, RuntimeError,
    StructuralError,
};
pub use graph::{LinkId, PropertyLink};
pub use node::handle::{Direction, EngineId, NodeHandle, NodeId, PropertyHandle};
pub use node::{AnimationChannel, Interpolation, NodeConfig, ScriptDefinition};
pub use property::{Inputs, Outputs, PropertyKind, PropertyValue, TreeValue, TypeSpec, Value};
pub use scene::{SceneObjectId, SceneState};
