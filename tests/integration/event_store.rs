use super::support::{agent, graph_nodes, FailingHistory, FailingStateService};
use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::json;
use spellhub::config::EventStoreConfig;
use spellhub::event::{
    Event, EventHistory, EventProperty, FinishPolicy, GraphInterpreter, StateService,
};
use spellhub::services::{MemoryEventHistory, MemoryStateService};
use spellhub::types::GraphNodes;
use spellhub::{ApiError, EventStore, Status};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify, Semaphore};

fn store(
    state_service: Arc<dyn StateService>,
    history: Arc<dyn EventHistory>,
    policy: FinishPolicy,
) -> Arc<EventStore> {
    let config = EventStoreConfig {
        finish_policy: policy,
        ..EventStoreConfig::default()
    };
    Arc::new(EventStore::with_config(
        agent("agent-1", "project-1"),
        state_service,
        history,
        config,
    ))
}

fn memory_store() -> (Arc<EventStore>, Arc<MemoryStateService>, Arc<MemoryEventHistory>) {
    let state = Arc::new(MemoryStateService::new());
    let history = Arc::new(MemoryEventHistory::new());
    let store = store(state.clone(), history.clone(), FinishPolicy::Lenient);
    store.init(graph_nodes());
    (store, state, history)
}

fn message(sender: &str) -> Event {
    Event::new(sender, "general", format!("{}-state", sender)).with_connector("discord")
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Await,
    Finish,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![Just(Step::Await), Just(Step::Finish)]
}

proptest! {
    #[test]
    fn counter_tracks_unmatched_awaits(steps in prop::collection::vec(step(), 0..64)) {
        let (store, _, _) = memory_store();
        let mut expected: usize = 0;

        for step in steps {
            match step {
                Step::Await => {
                    store.await_node();
                    expected += 1;
                    prop_assert_eq!(store.status(), Status::Await);
                }
                Step::Finish => {
                    store.finish().unwrap();
                    expected = expected.saturating_sub(1);
                    if expected == 0 {
                        prop_assert_eq!(store.status(), Status::Done);
                    } else {
                        prop_assert_eq!(store.status(), Status::Await);
                    }
                }
            }
            prop_assert_eq!(store.async_node_count(), expected);
        }
    }

    #[test]
    fn done_only_after_last_pending_finish(awaits in 1usize..16, finishes in 0usize..16) {
        let (store, _, _) = memory_store();
        for _ in 0..awaits {
            store.await_node();
        }
        for _ in 0..finishes.min(awaits) {
            store.finish().unwrap();
        }
        if finishes < awaits {
            prop_assert_ne!(store.status(), Status::Done);
        } else {
            prop_assert_eq!(store.status(), Status::Done);
        }
    }
}

#[tokio::test]
async fn done_while_awaiting_is_a_noop() {
    let (store, state, _) = memory_store();
    store.set_event(message("alice")).await.unwrap();
    store.await_node();

    store.done().await.unwrap();
    assert_eq!(store.status(), Status::Await);
    assert_eq!(state.sync_calls(), 0);

    store.finish().unwrap();
    store.done().await.unwrap();
    assert_eq!(store.status(), Status::Ready);
    assert_eq!(state.sync_calls(), 1);
}

#[tokio::test]
async fn query_before_any_event_skips_history() {
    let (store, _, history) = memory_store();
    let result = store
        .query_events(&[EventProperty::Sender], &["message".to_string()], None)
        .await
        .unwrap();
    assert_eq!(result, None);
    assert_eq!(history.find_calls(), 0);
}

#[tokio::test]
async fn query_maps_user_properties_to_sender() {
    let (store, _, history) = memory_store();
    store.set_event(message("alice")).await.unwrap();

    store
        .query_events(
            &[
                "from user".parse::<EventProperty>().unwrap(),
                "to user".parse::<EventProperty>().unwrap(),
            ],
            &["message".to_string()],
            Some(10),
        )
        .await
        .unwrap();

    let query = serde_json::to_value(history.last_query().unwrap()).unwrap();
    assert_eq!(
        query,
        json!({
            "agentId": "agent-1",
            "eventTypes": ["message"],
            "fromUser": "alice",
            "toUser": "alice",
            "$limit": 10,
        })
    );
}

#[tokio::test]
async fn query_returns_history_records_of_the_sender() {
    let (store, _, history) = memory_store();
    history.record_event("agent-1", "message", &message("alice"), Some("alice"), Some("agent-1"));
    history.record_event("agent-1", "message", &message("bob"), Some("bob"), Some("agent-1"));
    history.record_event("agent-1", "message", &message("agent-1"), Some("agent-1"), Some("alice"));

    store.set_event(message("alice")).await.unwrap();
    let sent_by_alice = store
        .query_events(&[EventProperty::FromUser], &["message".to_string()], None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent_by_alice.len(), 1);
    assert_eq!(sent_by_alice[0]["sender"], json!("alice"));

    let sent_to_alice = store
        .query_events(&[EventProperty::ToUser], &["message".to_string()], None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent_to_alice.len(), 1);
    assert_eq!(sent_to_alice[0]["sender"], json!("agent-1"));
}

#[tokio::test]
async fn rehydrate_failure_propagates_from_set_event() {
    let store = store(
        Arc::new(FailingStateService {
            fail_rehydrate: true,
            fail_sync: false,
        }),
        Arc::new(MemoryEventHistory::new()),
        FinishPolicy::Lenient,
    );
    store.init(graph_nodes());
    let result = store.set_event(message("alice")).await;
    assert!(matches!(result, Err(ApiError::StateService(_))));
}

#[tokio::test]
async fn sync_failure_propagates_from_done() {
    let store = store(
        Arc::new(FailingStateService {
            fail_rehydrate: false,
            fail_sync: true,
        }),
        Arc::new(MemoryEventHistory::new()),
        FinishPolicy::Lenient,
    );
    store.init(graph_nodes());
    store.set_event(message("alice")).await.unwrap();
    assert!(matches!(store.done().await, Err(ApiError::StateService(_))));
    assert_ne!(store.status(), Status::Ready);
}

#[tokio::test]
async fn history_failure_is_not_swallowed() {
    let store = store(
        Arc::new(MemoryStateService::new()),
        Arc::new(FailingHistory),
        FinishPolicy::Lenient,
    );
    store.init(graph_nodes());
    store.set_event(message("alice")).await.unwrap();
    let result = store
        .query_events(&[EventProperty::Sender], &[], None)
        .await;
    assert!(matches!(result, Err(ApiError::EventHistory(_))));
}

#[tokio::test]
async fn strict_policy_rejects_unmatched_finish() {
    let store = store(
        Arc::new(MemoryStateService::new()),
        Arc::new(MemoryEventHistory::new()),
        FinishPolicy::Strict,
    );
    store.init(graph_nodes());
    store.set_event(message("alice")).await.unwrap();
    assert!(matches!(store.finish(), Err(ApiError::UnmatchedFinish(_))));
    assert_eq!(store.status(), Status::Running);
}

/// Suspends one branch on a timer, the way a "wait for reply" node does.
struct DelayedReplyInterpreter {
    resumed: parking_lot::Mutex<Option<oneshot::Sender<Status>>>,
}

#[async_trait]
impl GraphInterpreter for DelayedReplyInterpreter {
    async fn execute(&self, _event: &Event, store: Arc<EventStore>) -> anyhow::Result<()> {
        let branch = store.await_node();
        let resumed = self.resumed.lock().take();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let status = store.resume(branch).await.unwrap_or(Status::Errored);
            if let Some(tx) = resumed {
                let _ = tx.send(status);
            }
        });
        Ok(())
    }
}

#[tokio::test]
async fn run_event_with_async_branch_completes_on_resume() {
    let (store, state, _) = memory_store();
    let (tx, rx) = oneshot::channel();
    let interpreter = DelayedReplyInterpreter {
        resumed: parking_lot::Mutex::new(Some(tx)),
    };

    let status = store.run_event(message("alice"), &interpreter).await.unwrap();
    assert_eq!(status, Status::Await);
    assert_eq!(state.sync_calls(), 0);

    let resumed = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resumed, Status::Ready);
    assert!(store.is_ready());
    assert_eq!(state.sync_calls(), 1);
}

struct FailingInterpreter;

#[async_trait]
impl GraphInterpreter for FailingInterpreter {
    async fn execute(&self, _event: &Event, _store: Arc<EventStore>) -> anyhow::Result<()> {
        anyhow::bail!("node 'output' has no connector")
    }
}

#[tokio::test]
async fn run_event_failure_marks_store_errored() {
    let (store, _, _) = memory_store();
    let result = store.run_event(message("alice"), &FailingInterpreter).await;
    assert!(matches!(result, Err(ApiError::Execution(_))));
    assert_eq!(store.status(), Status::Errored);

    store.init(graph_nodes());
    assert!(store.is_ready());
}

/// Blocks `sync_and_clear_state` until the test adds a permit.
struct GatedSync {
    entered: Notify,
    release: Semaphore,
}

#[async_trait]
impl StateService for GatedSync {
    async fn rehydrate_state(&self, _nodes: &GraphNodes, _state_key: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn sync_and_clear_state(&self) -> Result<(), ApiError> {
        self.entered.notify_one();
        let _permit = self
            .release
            .acquire()
            .await
            .map_err(|e| ApiError::StateService(e.to_string()))?;
        Ok(())
    }
}

#[tokio::test]
async fn event_set_during_sync_is_not_marked_ready() {
    let state = Arc::new(GatedSync {
        entered: Notify::new(),
        release: Semaphore::new(0),
    });
    let store = store(
        state.clone(),
        Arc::new(MemoryEventHistory::new()),
        FinishPolicy::Lenient,
    );
    store.init(graph_nodes());
    store.set_event(message("alice")).await.unwrap();

    let completing = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.done().await })
    };
    state.entered.notified().await;

    store.set_event(message("bob")).await.unwrap();
    state.release.add_permits(1);
    completing.await.unwrap().unwrap();

    assert_eq!(store.status(), Status::Running);
    assert_eq!(store.current_event().unwrap().sender, "bob");
}
