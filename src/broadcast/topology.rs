use std::sync::Arc;

use parking_lot::RwLock;

use crate::network::{NodeId, TopologyMap};

/// The neighbor graph gossip fans out along.
///
/// Replaced wholesale, never merged: a reader sees either the old mapping
/// or the new one.
#[derive(Debug, Default)]
pub struct Topology {
    current: RwLock<Generation>,
}

#[derive(Debug, Default)]
struct Generation {
    number: u64,
    mapping: Arc<TopologyMap>,
}

impl Topology {
    pub fn new() -> Self {
        Topology::default()
    }

    /// Installs `mapping` and returns its generation number.
    pub fn replace(&self, mapping: TopologyMap) -> u64 {
        let mapping = Arc::new(mapping);
        let mut current = self.current.write();
        current.number += 1;
        let previous = std::mem::replace(&mut current.mapping, mapping);
        let number = current.number;
        drop(current);
        drop(previous);
        number
    }

    /// Neighbors of `node`; empty when `node` is not in the mapping.
    pub fn neighbors(&self, node: &str) -> Vec<NodeId> {
        let mapping = Arc::clone(&self.current.read().mapping);
        mapping.get(node).cloned().unwrap_or_default()
    }

    pub fn generation(&self) -> u64 {
        self.current.read().number
    }
}
