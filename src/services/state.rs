//! Memory-backed per-event graph state.

use crate::error::ApiError;
use crate::event::StateService;
use crate::types::{GraphNodes, StateKey};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

type NodeStates = BTreeMap<String, Value>;

/// Live state of the event currently being processed
struct LiveState {
    state_key: StateKey,
    nodes: NodeStates,
}

/// Keeps one node-state snapshot per state key.
///
/// `rehydrate_state` loads the snapshot for a key as the live state, graph
/// nodes write to the live state while they run, and `sync_and_clear_state`
/// stores it back under its key.
#[derive(Default)]
pub struct MemoryStateService {
    snapshots: RwLock<HashMap<StateKey, NodeStates>>,
    live: RwLock<Option<LiveState>>,
    rehydrate_calls: AtomicUsize,
    sync_calls: AtomicUsize,
    last_rehydrated_key: RwLock<Option<StateKey>>,
}

impl MemoryStateService {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `node_id` in the live state
    pub fn node_state(&self, node_id: &str) -> Option<Value> {
        self.live
            .read()
            .as_ref()
            .and_then(|live| live.nodes.get(node_id).cloned())
    }

    /// Write `node_id`'s state; false when no state is live
    pub fn set_node_state(&self, node_id: impl Into<String>, value: Value) -> bool {
        match self.live.write().as_mut() {
            Some(live) => {
                live.nodes.insert(node_id.into(), value);
                true
            }
            None => false,
        }
    }

    /// Persisted snapshot for `state_key`
    pub fn snapshot(&self, state_key: &str) -> Option<BTreeMap<String, Value>> {
        self.snapshots.read().get(state_key).cloned()
    }

    pub fn has_live_state(&self) -> bool {
        self.live.read().is_some()
    }

    pub fn rehydrate_calls(&self) -> usize {
        self.rehydrate_calls.load(Ordering::SeqCst)
    }

    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    pub fn last_rehydrated_key(&self) -> Option<StateKey> {
        self.last_rehydrated_key.read().clone()
    }
}

#[async_trait]
impl StateService for MemoryStateService {
    async fn rehydrate_state(
        &self,
        graph_nodes: &GraphNodes,
        state_key: &str,
    ) -> Result<(), ApiError> {
        self.rehydrate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_rehydrated_key.write() = Some(state_key.to_string());

        // Nodes removed from the graph since the snapshot was taken are dropped.
        let nodes: NodeStates = self
            .snapshots
            .read()
            .get(state_key)
            .map(|snapshot| {
                snapshot
                    .iter()
                    .filter(|(id, _)| graph_nodes.get(id).is_some())
                    .map(|(id, value)| (id.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        debug!(state_key, nodes = nodes.len(), "Rehydrated graph state");
        *self.live.write() = Some(LiveState {
            state_key: state_key.to_string(),
            nodes,
        });
        Ok(())
    }

    async fn sync_and_clear_state(&self) -> Result<(), ApiError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(live) = self.live.write().take() {
            debug!(state_key = %live.state_key, nodes = live.nodes.len(), "Synced graph state");
            self.snapshots.write().insert(live.state_key, live.nodes);
        }
        Ok(())
    }
}
