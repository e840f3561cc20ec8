//! Collaborator contracts consumed by the event store.

use super::payload::Event;
use super::query::GraphEventQuery;
use super::store::EventStore;
use crate::error::ApiError;
use crate::types::GraphNodes;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Per-event graph state persistence.
#[async_trait]
pub trait StateService: Send + Sync {
    /// Load the persisted node state stored under `state_key` into the live graph state.
    async fn rehydrate_state(&self, graph_nodes: &GraphNodes, state_key: &str)
        -> Result<(), ApiError>;

    /// Persist the live graph state and clear it.
    async fn sync_and_clear_state(&self) -> Result<(), ApiError>;
}

/// Historical graph events.
#[async_trait]
pub trait EventHistory: Send + Sync {
    /// Return the raw result set matching `query`.
    async fn find(&self, query: &GraphEventQuery) -> Result<Vec<Value>, ApiError>;
}

/// Graph interpreter driven by [`EventStore::run_event`].
///
/// Nodes that continue past `execute` must call `store.await_node()` before
/// returning and pass the generation it returns to `store.resume()` once their
/// work completes.
#[async_trait]
pub trait GraphInterpreter: Send + Sync {
    async fn execute(&self, event: &Event, store: Arc<EventStore>) -> anyhow::Result<()>;
}
