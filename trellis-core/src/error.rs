//! Error Types
//!
//! Errors are grouped by how far their effects reach:
//!
//! - `LinkError` and `StructuralError` are detected synchronously by the call
//!   that caused them and never modify engine state.
//! - `CycleError` aborts a whole tick or save before anything is touched.
//! - `RuntimeError` is scoped to one node's update; the tick carries on with
//!   the remaining nodes.
//!
//! Besides being returned, every error is also recorded as an `ErrorReport`
//! in the engine's error list, which each public mutating call replaces.

use thiserror::Error;

use crate::node::handle::{NodeHandle, NodeId};
use crate::property::PropertyKind;

/// A rejected `link`, `unlink` or write to a linked input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("link source must be a property of a node's output tree")]
    SourceNotOutput,

    #[error("link target must be a property of a node's input tree")]
    TargetNotInput,

    #[error("cannot link two properties of the same node")]
    SameNode,

    #[error("cannot link {from} output to {to} input")]
    TypeMismatch {
        from: PropertyKind,
        to: PropertyKind,
    },

    #[error("cannot link a {0} property; only leaf properties can be linked")]
    ContainerLink(PropertyKind),

    #[error("target property is already linked to another output")]
    AlreadyLinked,

    #[error("property belongs to a different engine instance")]
    ForeignEndpoint,

    #[error("no link exists between these two properties")]
    NotLinked,

    #[error("cannot set an input that is the target of a link")]
    InputIsLinked,
}

/// The strong links between nodes form at least one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "failed to sort logic nodes: strong links form a cycle through {} node(s); \
     create a loop-free link graph or close the loop with a weak link",
    .nodes.len()
)]
pub struct CycleError {
    /// Nodes left over after every resolvable node was ordered.
    pub nodes: Vec<NodeId>,
}

/// A node's update failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("node '{node_name}' failed to update: {message}")]
pub struct RuntimeError {
    pub node: NodeHandle,
    pub node_name: String,
    pub message: String,
}

/// A handle, path, type or configuration did not fit the engine's content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("{0} does not exist in this engine")]
    UnknownNode(NodeHandle),

    #[error("handle belongs to a different engine instance")]
    ForeignHandle,

    #[error("property does not exist")]
    UnknownProperty,

    #[error("no child property '{0}'")]
    NoSuchChild(String),

    #[error("property of kind {0} has no value")]
    NotALeaf(PropertyKind),

    #[error("property of kind {0} has no children")]
    NotAContainer(PropertyKind),

    #[error("type mismatch: property is {expected}, value is {actual}")]
    TypeMismatch {
        expected: PropertyKind,
        actual: PropertyKind,
    },

    #[error("output properties can only be written by their node")]
    ReadOnlyOutput,

    #[error("invalid interface: {0}")]
    InvalidInterface(String),

    #[error("no script definition named '{0}'")]
    UnknownScript(String),

    #[error("a script definition named '{0}' is already registered")]
    DuplicateScript(String),

    #[error("invalid animation: {0}")]
    InvalidAnimation(String),

    #[error("scene object {0} does not exist")]
    UnknownSceneObject(u64),
}

/// Serialization or deserialization of engine content failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("failed to encode engine content: {0}")]
    Encode(String),

    #[error("failed to decode engine content: {0}")]
    Decode(String),

    #[error("unsupported format version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("inconsistent engine content: {0}")]
    Content(String),
}

/// Any error produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl EngineError {
    /// The category this error is reported under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Link(_) => ErrorKind::Link,
            Self::Cycle(_) => ErrorKind::Cycle,
            Self::Runtime(_) => ErrorKind::Runtime,
            Self::Structural(_) => ErrorKind::Structural,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

/// Category of a reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Link,
    Cycle,
    Runtime,
    Structural,
    Persistence,
}

/// One entry of the engine's error list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    /// The node the error originated from, if any.
    pub node: Option<NodeHandle>,
}

impl ErrorReport {
    pub(crate) fn new(error: &EngineError, node: Option<NodeHandle>) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_convert_into_engine_error() {
        let err: EngineError = LinkError::SameNode.into();
        assert_eq!(err.kind(), ErrorKind::Link);

        let err: EngineError = CycleError { nodes: vec![] }.into();
        assert_eq!(err.kind(), ErrorKind::Cycle);
    }

    #[test]
    fn messages_name_the_kinds() {
        let err = LinkError::TypeMismatch {
            from: PropertyKind::Float,
            to: PropertyKind::Int32,
        };
        assert_eq!(err.to_string(), "cannot link Float output to Int32 input");
    }
}
