//! Node Arena
//!
//! Nodes live in a slot vector addressed by generational `NodeId`s. Removing
//! a node bumps its slot's generation before the slot is recycled, so any ID
//! still held elsewhere stops resolving instead of aliasing a new node.

use super::handle::NodeId;
use super::LogicNode;

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<LogicNode>,
}

/// Generational storage for the nodes of one engine.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl NodeArena {
    /// Create a new empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node and return its ID.
    pub fn insert(&mut self, node: LogicNode) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId::from_parts(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId::from_parts(index, 0)
    }

    /// An empty arena that never hands out an ID this one issued.
    ///
    /// Every slot keeps its position with a bumped generation, so IDs from
    /// `self` do not resolve in the successor.
    pub fn successor(&self) -> Self {
        let slots = self
            .slots
            .iter()
            .map(|slot| Slot {
                generation: slot.generation.wrapping_add(1),
                node: None,
            })
            .collect::<Vec<_>>();
        let free = (0..slots.len() as u32).rev().collect();
        Self { slots, free, len: 0 }
    }

    /// Remove a node, invalidating its ID.
    pub fn remove(&mut self, id: NodeId) -> Option<LogicNode> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.len -= 1;
        Some(node)
    }

    /// Get a node by ID.
    pub fn get(&self, id: NodeId) -> Option<&LogicNode> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    /// Get a mutable node by ID.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut LogicNode> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    /// Whether `id` resolves to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// All live nodes, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &LogicNode)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node
                .as_ref()
                .map(|node| (NodeId::from_parts(index as u32, slot.generation), node))
        })
    }

    /// Live node IDs sorted by creation sequence.
    pub fn ids_in_creation_order(&self) -> Vec<NodeId> {
        let mut nodes: Vec<(u64, NodeId)> =
            self.iter().map(|(id, node)| (node.sequence(), id)).collect();
        nodes.sort_unstable();
        nodes.into_iter().map(|(_, id)| id).collect()
    }

    /// Get the number of live nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::node::timer::TimerNode;

    fn timer(sequence: u64) -> LogicNode {
        LogicNode::new(format!("t{sequence}"), NodeKind::Timer(TimerNode::default()), None, None, sequence)
    }

    #[test]
    fn add_and_remove_nodes() {
        let mut arena = NodeArena::new();
        let id1 = arena.insert(timer(0));
        let id2 = arena.insert(timer(1));
        assert_eq!(arena.len(), 2);

        assert!(arena.remove(id1).is_some());
        assert_eq!(arena.len(), 1);
        assert!(arena.get(id1).is_none());
        assert!(arena.get(id2).is_some());
        assert!(arena.remove(id1).is_none());
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let mut arena = NodeArena::new();
        let old = arena.insert(timer(0));
        arena.remove(old);
        let new = arena.insert(timer(1));

        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
        assert!(arena.get(old).is_none());
        assert_eq!(arena.get(new).map(|n| n.name()), Some("t1"));
    }

    #[test]
    fn creation_order_survives_slot_reuse() {
        let mut arena = NodeArena::new();
        let a = arena.insert(timer(0));
        let b = arena.insert(timer(1));
        arena.remove(a);
        let c = arena.insert(timer(2));

        // c reuses a's slot but was created last.
        assert_eq!(arena.ids_in_creation_order(), vec![b, c]);
        assert_eq!(arena.iter().count(), 2);
    }

    #[test]
    fn successor_invalidates_all_ids() {
        let mut arena = NodeArena::new();
        let a = arena.insert(timer(0));
        let b = arena.insert(timer(1));

        let mut next = arena.successor();
        assert!(next.is_empty());
        let first = next.insert(timer(2));
        let second = next.insert(timer(3));

        assert_eq!((first.index(), second.index()), (a.index(), b.index()));
        assert!(next.get(a).is_none());
        assert!(next.get(b).is_none());
        assert!(next.get(first).is_some());
    }
}
