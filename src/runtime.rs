//! Agent runtime
//!
//! Wires one agent's command hub to its event store: commands published on
//! the agent's channels drive events through the graph interpreter.

use crate::agent::Agent;
use crate::broker::Broker;
use crate::command::{CommandHub, CommandListener};
use crate::config::HubConfig;
use crate::error::ApiError;
use crate::event::{Event, EventHistory, EventStore, GraphInterpreter, StateService};
use crate::types::GraphNodes;
use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Subdomain of the built-in agent commands
pub const CORE_SUBDOMAIN: &str = "core";

/// External collaborators of a running agent
pub struct RuntimeServices {
    pub broker: Arc<dyn Broker>,
    pub state_service: Arc<dyn StateService>,
    pub history: Arc<dyn EventHistory>,
    pub interpreter: Arc<dyn GraphInterpreter>,
}

/// A running agent: its command hub and its event store.
///
/// Registers `agent:core:runEvent` (payload: an [`Event`]) and
/// `agent:core:status`. Events run on the hub's dispatch task, one at a time:
/// a `runEvent` waits for the previous event, including its suspended
/// branches, to settle before it starts.
pub struct AgentRuntime {
    agent: Arc<Agent>,
    hub: CommandHub,
    store: Arc<EventStore>,
}

impl AgentRuntime {
    pub async fn start(
        agent: Arc<Agent>,
        graph_nodes: GraphNodes,
        services: RuntimeServices,
        config: &HubConfig,
    ) -> Result<Self, ApiError> {
        let store = Arc::new(EventStore::with_config(
            Arc::clone(&agent),
            services.state_service,
            services.history,
            config.event_store.clone(),
        ));
        store.init(graph_nodes);

        let hub = CommandHub::start(Arc::clone(&agent), services.broker, config).await?;
        hub.register_domain(
            "agent",
            CORE_SUBDOMAIN,
            [
                (
                    "runEvent",
                    run_event_listener(
                        Arc::clone(&store),
                        services.interpreter,
                        config.event_store.settle_timeout(),
                    ),
                ),
                ("status", status_listener(Arc::clone(&store))),
            ],
        )?;

        info!(agent_id = %agent.id(), project_id = %agent.project_id(), "Agent runtime started");
        Ok(Self { agent, hub, store })
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn hub(&self) -> &CommandHub {
        &self.hub
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Tear down the hub. Pending async branches are abandoned, not cancelled.
    pub async fn shutdown(&self) {
        self.hub.on_destroy().await;
        let pending = self.store.async_node_count();
        if pending > 0 {
            warn!(
                agent_id = %self.agent.id(),
                pending,
                status = %self.store.status(),
                "Shutting down with pending async nodes"
            );
        }
        info!(agent_id = %self.agent.id(), "Agent runtime stopped");
    }
}

fn run_event_listener(
    store: Arc<EventStore>,
    interpreter: Arc<dyn GraphInterpreter>,
    settle_timeout: Duration,
) -> CommandListener {
    CommandListener::new(move |data: Value, _agent: Arc<Agent>| {
        let store = Arc::clone(&store);
        let interpreter = Arc::clone(&interpreter);
        async move {
            let event: Event = serde_json::from_value(data).context("invalid runEvent payload")?;
            if store.is_running() {
                debug!(status = %store.status(), "runEvent waiting for the previous event");
            }
            store
                .wait_until_settled(settle_timeout)
                .await
                .context("runEvent rejected")?;
            let status = store.run_event(event, interpreter.as_ref()).await?;
            debug!(status = %status, "runEvent returned");
            Ok(())
        }
    })
}

fn status_listener(store: Arc<EventStore>) -> CommandListener {
    CommandListener::from_fn(move |_data: Value, agent: Arc<Agent>| {
        info!(
            agent_id = %agent.id(),
            status = %store.status(),
            async_nodes = store.async_node_count(),
            current_event = store.current_event().is_some(),
            "Agent status"
        );
        Ok(())
    })
}
