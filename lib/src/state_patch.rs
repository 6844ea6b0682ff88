//! Overlay of state changes accumulated during lookahead, applied to the
//! real state only when a step completes outside of choice evaluation.
use std::collections::{HashMap, HashSet};

use crate::node::NodeId;
use crate::value_type::ValueType;

#[derive(Clone, Default)]
pub struct StatePatch {
    pub globals: HashMap<String, ValueType>,
    pub changed_variables: HashSet<String>,
    pub visit_counts: HashMap<NodeId, i32>,
    pub turn_indices: HashMap<NodeId, i32>,
}

impl StatePatch {
    pub fn new(to_copy: Option<&StatePatch>) -> StatePatch {
        match to_copy {
            Some(patch) => patch.clone(),
            None => StatePatch::default(),
        }
    }

    pub fn get_global(&self, name: &str) -> Option<&ValueType> {
        self.globals.get(name)
    }

    pub fn set_global(&mut self, name: &str, value: ValueType) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn add_changed_variable(&mut self, name: &str) {
        self.changed_variables.insert(name.to_string());
    }

    pub fn get_visit_count(&self, container: NodeId) -> Option<i32> {
        self.visit_counts.get(&container).copied()
    }

    pub fn set_visit_count(&mut self, container: NodeId, count: i32) {
        self.visit_counts.insert(container, count);
    }

    pub fn get_turn_index(&self, container: NodeId) -> Option<i32> {
        self.turn_indices.get(&container).copied()
    }

    pub fn set_turn_index(&mut self, container: NodeId, index: i32) {
        self.turn_indices.insert(container, index);
    }
}
