//! Event store state machine.

use super::contract::{EventHistory, GraphInterpreter, StateService};
use super::payload::Event;
use super::query::{EventProperty, GraphEventQuery};
use super::status::{FinishPolicy, Status};
use crate::agent::Agent;
use crate::config::EventStoreConfig;
use crate::error::ApiError;
use crate::types::GraphNodes;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

/// Identifies the in-flight event a suspended branch belongs to.
///
/// Returned by [`EventStore::await_node`]; pass it to [`EventStore::resume`] so
/// a branch that outlives its event cannot complete the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventGeneration(u64);

/// Mutable state guarded as one unit.
struct StoreState {
    status: Status,
    /// Graph nodes suspended by `await_node` and not yet resumed by `finish`
    async_node_counter: usize,
    current_event: Option<Event>,
    graph_nodes: Option<GraphNodes>,
    /// Bumped by `init` and `set_event`
    generation: u64,
}

/// Tracks the one in-flight event of an agent instance.
///
/// All transitions go through a single mutex that is never held across a
/// collaborator call, so graph nodes may share the store as `Arc<EventStore>`
/// and call `await_node`/`finish` from any task.
pub struct EventStore {
    agent: Arc<Agent>,
    state_service: Arc<dyn StateService>,
    history: Arc<dyn EventHistory>,
    config: EventStoreConfig,
    state: Mutex<StoreState>,
    /// Signalled whenever the store leaves RUNNING/AWAIT/DONE
    settled: Notify,
}

impl EventStore {
    pub fn new(
        agent: Arc<Agent>,
        state_service: Arc<dyn StateService>,
        history: Arc<dyn EventHistory>,
    ) -> Self {
        Self::with_config(agent, state_service, history, EventStoreConfig::default())
    }

    pub fn with_config(
        agent: Arc<Agent>,
        state_service: Arc<dyn StateService>,
        history: Arc<dyn EventHistory>,
        config: EventStoreConfig,
    ) -> Self {
        Self {
            agent,
            state_service,
            history,
            config,
            state: Mutex::new(StoreState {
                status: Status::Init,
                async_node_counter: 0,
                current_event: None,
                graph_nodes: None,
                generation: 0,
            }),
            settled: Notify::new(),
        }
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// Store the graph's node set and become READY.
    ///
    /// Also recovers a store left ERRORED.
    pub fn init(&self, graph_nodes: GraphNodes) {
        let mut state = self.state.lock();
        if state.async_node_counter > 0 {
            warn!(
                agent_id = %self.agent.id(),
                abandoned = state.async_node_counter,
                "Re-initializing event store with pending async nodes"
            );
        }
        state.current_event = None;
        state.async_node_counter = 0;
        state.graph_nodes = Some(graph_nodes);
        state.generation += 1;
        state.status = Status::Ready;
        drop(state);
        self.settled.notify_waiters();
        debug!(agent_id = %self.agent.id(), "Event store ready");
    }

    /// Make `event` the in-flight event and rehydrate its persisted state.
    ///
    /// Any previous event is overwritten, not queued.
    pub async fn set_event(&self, event: Event) -> Result<(), ApiError> {
        if event.state_key.trim().is_empty() {
            return Err(ApiError::MissingStateKey);
        }

        let (graph_nodes, state_key) = {
            let mut state = self.state.lock();
            let Some(graph_nodes) = state.graph_nodes.clone() else {
                return Err(ApiError::NotInitialized);
            };
            if state.async_node_counter > 0 {
                warn!(
                    agent_id = %self.agent.id(),
                    abandoned = state.async_node_counter,
                    previous_status = %state.status,
                    "Overwriting in-flight event with pending async nodes"
                );
            }
            let state_key = event.state_key.clone();
            state.current_event = Some(event);
            state.async_node_counter = 0;
            state.generation += 1;
            state.status = Status::Running;
            (graph_nodes, state_key)
        };

        debug!(agent_id = %self.agent.id(), state_key = %state_key, "Rehydrating event state");
        self.state_service
            .rehydrate_state(&graph_nodes, &state_key)
            .await
    }

    pub fn current_event(&self) -> Option<Event> {
        self.state.lock().current_event.clone()
    }

    /// Query historical events correlated with the in-flight event.
    ///
    /// Returns `Ok(None)` without calling the history service when no event is
    /// in flight. `limit` defaults to the configured query limit.
    pub async fn query_events(
        &self,
        property_keys: &[EventProperty],
        message_types: &[String],
        limit: Option<usize>,
    ) -> Result<Option<Vec<Value>>, ApiError> {
        let query = {
            let state = self.state.lock();
            let Some(event) = state.current_event.as_ref() else {
                return Ok(None);
            };
            GraphEventQuery::for_event(
                self.agent.id(),
                event,
                property_keys,
                message_types,
                limit.unwrap_or(self.config.default_query_limit),
            )
        };

        debug!(
            agent_id = %self.agent.id(),
            event_types = ?query.event_types,
            limit = query.limit,
            "Querying graph events"
        );
        let results = self.history.find(&query).await?;
        Ok(Some(results))
    }

    /// Register a graph node that suspended on async work.
    ///
    /// The returned generation identifies the current event for [`Self::resume`].
    pub fn await_node(&self) -> EventGeneration {
        let mut state = self.state.lock();
        state.async_node_counter += 1;
        state.status = Status::Await;
        debug!(
            agent_id = %self.agent.id(),
            counter = state.async_node_counter,
            "Async node awaiting"
        );
        EventGeneration(state.generation)
    }

    pub fn generation(&self) -> EventGeneration {
        EventGeneration(self.state.lock().generation)
    }

    /// Register that a suspended graph node resumed.
    ///
    /// The status becomes DONE once no async node is pending. With
    /// [`FinishPolicy::Strict`] a call with nothing pending is rejected.
    pub fn finish(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        self.finish_locked(&mut state)
    }

    fn finish_locked(&self, state: &mut StoreState) -> Result<(), ApiError> {
        if state.async_node_counter == 0 {
            match self.config.finish_policy {
                FinishPolicy::Strict => {
                    warn!(
                        agent_id = %self.agent.id(),
                        status = %state.status,
                        "Rejected finish without a pending async node"
                    );
                    return Err(ApiError::UnmatchedFinish(state.status.to_string()));
                }
                FinishPolicy::Lenient => {
                    debug!(
                        agent_id = %self.agent.id(),
                        status = %state.status,
                        "finish without a pending async node"
                    );
                }
            }
        } else {
            state.async_node_counter -= 1;
        }

        if state.async_node_counter == 0 {
            state.status = Status::Done;
        }
        debug!(
            agent_id = %self.agent.id(),
            counter = state.async_node_counter,
            status = %state.status,
            "Async node finished"
        );
        Ok(())
    }

    /// Sync and clear per-event state, then become READY if nothing is pending.
    ///
    /// No-op while AWAIT: a suspended branch is still in flight and will
    /// complete the event.
    pub async fn done(&self) -> Result<(), ApiError> {
        let generation = self.state.lock().generation;
        self.complete(generation).await
    }

    /// `finish()` followed by `done()` when that finish completed the event.
    ///
    /// Used by async nodes resuming outside the interpreter's own call.
    pub async fn finish_and_done(&self) -> Result<Status, ApiError> {
        self.finish_then_complete(None).await
    }

    /// `finish_and_done()` for a branch suspended under `generation`.
    ///
    /// Ignored once that event has been replaced or the store re-initialized.
    pub async fn resume(&self, generation: EventGeneration) -> Result<Status, ApiError> {
        self.finish_then_complete(Some(generation)).await
    }

    async fn finish_then_complete(
        &self,
        expected: Option<EventGeneration>,
    ) -> Result<Status, ApiError> {
        let generation = {
            let mut state = self.state.lock();
            if let Some(EventGeneration(expected)) = expected {
                if expected != state.generation {
                    debug!(
                        agent_id = %self.agent.id(),
                        branch_generation = expected,
                        current_generation = state.generation,
                        "Ignoring resume of a superseded event"
                    );
                    return Ok(state.status);
                }
            }
            self.finish_locked(&mut state)?;
            if state.status != Status::Done {
                return Ok(state.status);
            }
            state.generation
        };
        self.complete(generation).await?;
        Ok(self.status())
    }

    async fn complete(&self, generation: u64) -> Result<(), ApiError> {
        {
            let state = self.state.lock();
            if state.generation != generation {
                return Ok(());
            }
            if state.status == Status::Await {
                debug!(agent_id = %self.agent.id(), "done() deferred: async nodes pending");
                return Ok(());
            }
        }

        self.state_service.sync_and_clear_state().await?;

        let mut state = self.state.lock();
        if state.generation != generation {
            warn!(
                agent_id = %self.agent.id(),
                "Event replaced while its state was syncing"
            );
            return Ok(());
        }
        if state.async_node_counter == 0
            && matches!(state.status, Status::Running | Status::Done)
        {
            state.status = Status::Ready;
            drop(state);
            self.settled.notify_waiters();
            debug!(agent_id = %self.agent.id(), "Event completed, store ready");
        }
        Ok(())
    }

    /// Wait until no event is in progress, for at most `timeout`.
    ///
    /// Returns the settled status (READY, ERRORED or INIT), or
    /// [`ApiError::EventInFlight`] when the previous event is still running.
    pub async fn wait_until_settled(&self, timeout: Duration) -> Result<Status, ApiError> {
        let settled = async {
            loop {
                let notified = self.settled.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                let status = self.status();
                if !status.is_in_progress() {
                    return status;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, settled)
            .await
            .map_err(|_| ApiError::EventInFlight(self.status().to_string()))
    }

    /// Run one event through `interpreter`: set, execute, done.
    ///
    /// Any failure leaves the store ERRORED and is returned. If async nodes are
    /// still pending when the interpreter returns, the store stays AWAIT and
    /// the last `finish_and_done` completes the event.
    pub async fn run_event(
        self: &Arc<Self>,
        event: Event,
        interpreter: &dyn GraphInterpreter,
    ) -> Result<Status, ApiError> {
        let snapshot = event.clone();
        if let Err(e) = self.set_event(event).await {
            self.mark_errored(&e.to_string());
            return Err(e);
        }

        if let Err(e) = interpreter.execute(&snapshot, Arc::clone(self)).await {
            self.mark_errored(&format!("{:#}", e));
            return Err(ApiError::Execution(format!("{:#}", e)));
        }

        if let Err(e) = self.done().await {
            self.mark_errored(&e.to_string());
            return Err(e);
        }
        Ok(self.status())
    }

    /// Put the store into ERRORED after an unrecoverable failure.
    pub fn mark_errored(&self, reason: &str) {
        let mut state = self.state.lock();
        error!(
            agent_id = %self.agent.id(),
            previous_status = %state.status,
            reason,
            "Event store errored"
        );
        state.status = Status::Errored;
        drop(state);
        self.settled.notify_waiters();
    }

    pub fn is_ready(&self) -> bool {
        self.status() == Status::Ready
    }

    /// True while an event is in progress (RUNNING, AWAIT or DONE)
    pub fn is_running(&self) -> bool {
        self.status().is_in_progress()
    }

    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    pub fn async_node_count(&self) -> usize {
        self.state.lock().async_node_counter
    }
}
