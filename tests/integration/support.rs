use async_trait::async_trait;
use serde_json::Value;
use spellhub::broker::{Broker, MemoryBroker, MessageHandler, SubscriptionToken};
use spellhub::event::{EventHistory, GraphEventQuery, StateService};
use spellhub::types::GraphNodes;
use spellhub::{Agent, ApiError, BrokerError, CommandListener, CommandMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub fn agent(id: &str, project: &str) -> Arc<Agent> {
    Arc::new(Agent::new(id, project))
}

pub fn graph_nodes() -> GraphNodes {
    vec![("input", serde_json::json!({})), ("output", serde_json::json!({}))]
        .into_iter()
        .collect()
}

/// Listener forwarding `(tag, agent_id, data)` for every invocation
pub fn forwarding_listener(
    tag: &'static str,
    tx: mpsc::UnboundedSender<(String, String, Value)>,
) -> CommandListener {
    CommandListener::from_fn(move |data: Value, agent: Arc<Agent>| {
        let _ = tx.send((tag.to_string(), agent.id().to_string(), data));
        Ok(())
    })
}

pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for dispatch")
        .expect("channel closed")
}

/// True when nothing arrives within a short window
pub async fn stays_empty<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> bool {
    timeout(Duration::from_millis(150), rx.recv()).await.is_err()
}

/// Broker whose unsubscribe always fails
pub struct StickyBroker {
    pub inner: MemoryBroker,
}

#[async_trait]
impl Broker for StickyBroker {
    async fn subscribe(
        &self,
        channel: &str,
        handler: MessageHandler,
    ) -> Result<SubscriptionToken, BrokerError> {
        self.inner.subscribe(channel, handler).await
    }

    async fn unsubscribe(&self, _channel: &str) -> Result<(), BrokerError> {
        Err(BrokerError::Connection("connection reset".to_string()))
    }

    async fn publish(&self, channel: &str, message: CommandMessage) -> Result<(), BrokerError> {
        self.inner.publish(channel, message).await
    }
}

/// State service failing on the configured operation
pub struct FailingStateService {
    pub fail_rehydrate: bool,
    pub fail_sync: bool,
}

#[async_trait]
impl StateService for FailingStateService {
    async fn rehydrate_state(&self, _nodes: &GraphNodes, state_key: &str) -> Result<(), ApiError> {
        if self.fail_rehydrate {
            return Err(ApiError::StateService(format!("no state for {}", state_key)));
        }
        Ok(())
    }

    async fn sync_and_clear_state(&self) -> Result<(), ApiError> {
        if self.fail_sync {
            return Err(ApiError::StateService("write failed".to_string()));
        }
        Ok(())
    }
}

pub struct FailingHistory;

#[async_trait]
impl EventHistory for FailingHistory {
    async fn find(&self, _query: &GraphEventQuery) -> Result<Vec<Value>, ApiError> {
        Err(ApiError::EventHistory("database unavailable".to_string()))
    }
}
