use std::collections::HashSet;

use parking_lot::RwLock;

use crate::network::Value;

/// Every value this node has delivered. Grows monotonically.
#[derive(Debug, Default)]
pub struct DeliveredStore {
    values: RwLock<HashSet<Value>>,
}

impl DeliveredStore {
    pub fn new() -> Self {
        DeliveredStore {
            values: RwLock::new(HashSet::new()),
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.values.read().contains(value)
    }

    /// Returns true only for the call that actually added `value`.
    pub fn insert(&self, value: Value) -> bool {
        self.values.write().insert(value)
    }

    /// Point-in-time copy, in no particular order.
    pub fn snapshot(&self) -> Vec<Value> {
        self.values.read().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}
