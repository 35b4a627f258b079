//! Node Handles
//!
//! Every object in an engine is addressed through a small `Copy` handle
//! rather than a reference. Handles carry the identity of the engine that
//! issued them, so a handle from one engine is rejected by every other one.
//!
//! # Generational Indices
//!
//! A `NodeId` packs a slot index (low 32 bits) and a generation (high 32 bits)
//! into one `u64`. When a node is destroyed its slot may be reused, but the
//! generation is bumped first, so handles to the destroyed node no longer
//! match anything.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identity of one engine instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(u64);

impl EngineId {
    /// Generate a new process-unique engine ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EngineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineId({})", self.0)
    }
}

/// Generational index of a node slot within one engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    #[inline]
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self((index as u64) | ((generation as u64) << 32))
    }

    #[inline]
    pub const fn index(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}:{})", self.index(), self.generation())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index(), self.generation())
    }
}

/// Public handle to a logic node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    engine: EngineId,
    id: NodeId,
}

impl NodeHandle {
    pub(crate) fn new(engine: EngineId, id: NodeId) -> Self {
        Self { engine, id }
    }

    /// The engine that issued this handle.
    pub fn engine(&self) -> EngineId {
        self.engine
    }

    /// The generational node index.
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} of engine {}", self.id, self.engine.0)
    }
}

/// Which of a node's two property roots a property lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The node's input tree. Written by callers and by links.
    Input,
    /// The node's output tree. Written by the node's own update.
    Output,
}

/// Public handle to a single property of a node.
///
/// `slot` is the position of the property inside its tree; slot 0 is the root.
/// Property trees never change shape after node creation, so slots are stable
/// for the node's whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyHandle {
    node: NodeHandle,
    direction: Direction,
    slot: u32,
}

impl PropertyHandle {
    pub(crate) fn new(node: NodeHandle, direction: Direction, slot: u32) -> Self {
        Self { node, direction, slot }
    }

    /// The node that owns this property.
    pub fn node(&self) -> NodeHandle {
        self.node
    }

    /// Whether this property is in the input or output tree.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Position of the property inside its tree.
    pub fn slot(&self) -> u32 {
        self.slot
    }
}
