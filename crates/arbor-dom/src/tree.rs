//! DOM tree arena
//!
//! Nodes live in slots addressed by [`NodeId`]. Freed slots are reused and
//! their generation advanced, so stale handles resolve to nothing.

use crate::NodeId;
use crate::node::Node;

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena-based node storage
#[derive(Debug, Default)]
pub(crate) struct DomTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl DomTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId::new(index, 0)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Frees a slot. Links held by other nodes are the caller's concern.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let slot = self
            .slots
            .get_mut(id.slot())
            .filter(|slot| slot.generation == id.generation())?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot() as u32);
        self.live -= 1;
        Some(node)
    }

    /// Removes every node, in slot order
    pub fn drain(&mut self) -> Vec<(NodeId, Node)> {
        let drained = self
            .slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| {
                let node = slot.node.take()?;
                Some((NodeId::new(i as u32, slot.generation), node))
            })
            .collect();
        self.slots.clear();
        self.free.clear();
        self.live = 0;
        drained
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
