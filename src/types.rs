//! Core types shared by the hub and the event store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// AgentId: Unique identifier of a running agent
pub type AgentId = String;

/// ProjectId: Identifier of the project that owns an agent
pub type ProjectId = String;

/// StateKey: Correlates an event with its persisted per-event graph state
pub type StateKey = String;

/// The node set of the graph an event store drives.
///
/// Node configuration is opaque to the store; it is only handed to the state
/// service so it can rehydrate per-node state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphNodes {
    nodes: BTreeMap<String, Value>,
}

impl GraphNodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node's configuration
    pub fn insert(&mut self, node_id: impl Into<String>, config: Value) {
        self.nodes.insert(node_id.into(), config);
    }

    pub fn get(&self, node_id: &str) -> Option<&Value> {
        self.nodes.get(node_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for GraphNodes {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
