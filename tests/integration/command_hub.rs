use super::support::{agent, forwarding_listener, recv, stays_empty, StickyBroker};
use serde_json::{json, Value};
use spellhub::broker::{Broker, MemoryBroker};
use spellhub::config::HubConfig;
use spellhub::{Agent, CommandHub, CommandListener, CommandMessage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

async fn start_hub(broker: &MemoryBroker, agent_id: &str, project_id: &str) -> CommandHub {
    CommandHub::start(
        agent(agent_id, project_id),
        Arc::new(broker.connect()),
        &HubConfig::default(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn published_command_reaches_listener_with_data_and_agent() {
    let broker = MemoryBroker::new();
    let hub = start_hub(&broker, "agent-1", "project-1").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.register_domain("agent", "core", [("play", forwarding_listener("play", tx))])
        .unwrap();

    broker
        .publish(
            "agent:command:agent-1",
            CommandMessage::new("agent:core:play", json!({"spell": "hello"})),
        )
        .await
        .unwrap();

    let (tag, agent_id, data) = recv(&mut rx).await;
    assert_eq!(tag, "play");
    assert_eq!(agent_id, "agent-1");
    assert_eq!(data, json!({"spell": "hello"}));
}

#[tokio::test]
async fn unregistered_action_invokes_nothing() {
    let broker = MemoryBroker::new();
    let hub = start_hub(&broker, "agent-1", "project-1").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.register_domain("agent", "core", [("play", forwarding_listener("play", tx))])
        .unwrap();

    broker
        .publish(
            "agent:command:agent-1",
            CommandMessage::new("agent:core:pause", Value::Null),
        )
        .await
        .unwrap();
    assert!(stays_empty(&mut rx).await);
}

#[tokio::test]
async fn malformed_commands_are_dropped_and_registry_is_unchanged() {
    let broker = MemoryBroker::new();
    let hub = start_hub(&broker, "agent-1", "project-1").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.on_str("a:b:c", forwarding_listener("abc", tx)).unwrap();
    let before = hub.list_all_events();

    for command in ["", "a", "a:b", "a:b:c:d"] {
        broker
            .publish(
                "agent:command:agent-1",
                CommandMessage::new(command, Value::Null),
            )
            .await
            .unwrap();
    }
    assert!(stays_empty(&mut rx).await);
    assert_eq!(hub.list_all_events(), before);

    // the dispatch task is still alive
    broker
        .publish("agent:command:agent-1", CommandMessage::new("a:b:c", json!(1)))
        .await
        .unwrap();
    assert_eq!(recv(&mut rx).await.2, json!(1));
}

#[tokio::test]
async fn listeners_run_once_each_in_registration_order() {
    let broker = MemoryBroker::new();
    let hub = start_hub(&broker, "agent-1", "project-1").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    for tag in ["first", "second", "third"] {
        hub.on_str("plugin:slack:send", forwarding_listener(tag, tx.clone()))
            .unwrap();
    }

    broker
        .publish(
            "agent:command:agent-1",
            CommandMessage::new("plugin:slack:send", json!("hi")),
        )
        .await
        .unwrap();

    let mut tags = Vec::new();
    for _ in 0..3 {
        tags.push(recv(&mut rx).await.0);
    }
    assert_eq!(tags, vec!["first", "second", "third"]);
    assert!(stays_empty(&mut rx).await);
}

#[tokio::test]
async fn project_channel_reaches_every_agent_of_the_project() {
    let broker = MemoryBroker::new();
    let hub_a = start_hub(&broker, "agent-a", "project-1").await;
    let hub_b = start_hub(&broker, "agent-b", "project-1").await;
    let hub_c = start_hub(&broker, "agent-c", "project-2").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    for hub in [&hub_a, &hub_b, &hub_c] {
        hub.on_str("agent:core:toggleLive", forwarding_listener("toggle", tx.clone()))
            .unwrap();
    }

    broker
        .publish(
            "agent:command:project:project-1",
            CommandMessage::new("agent:core:toggleLive", Value::Null),
        )
        .await
        .unwrap();

    let mut agents = vec![recv(&mut rx).await.1, recv(&mut rx).await.1];
    agents.sort();
    assert_eq!(agents, vec!["agent-a", "agent-b"]);
    assert!(stays_empty(&mut rx).await);
}

#[tokio::test]
async fn commands_of_one_agent_never_dispatch_concurrently() {
    let broker = MemoryBroker::new();
    let hub = start_hub(&broker, "agent-1", "project-1").await;
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let listener = {
        let in_flight = in_flight.clone();
        let max_seen = max_seen.clone();
        CommandListener::new(move |data: Value, _agent: Arc<Agent>| {
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            let tx = tx.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                let _ = tx.send(data);
                Ok(())
            }
        })
    };
    hub.on_str("agent:core:work", listener).unwrap();

    for i in 0..5 {
        let channel = if i % 2 == 0 {
            "agent:command:agent-1"
        } else {
            "agent:command:project:project-1"
        };
        broker
            .publish(channel, CommandMessage::new("agent:core:work", json!(i)))
            .await
            .unwrap();
    }
    for _ in 0..5 {
        recv(&mut rx).await;
    }
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_listener_is_isolated_from_later_commands() {
    let broker = MemoryBroker::new();
    let hub = start_hub(&broker, "agent-1", "project-1").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.on_str(
        "agent:core:crash",
        CommandListener::from_fn(|_, _| panic!("listener bug")),
    )
    .unwrap();
    hub.on_str("agent:core:crash", forwarding_listener("after", tx.clone()))
        .unwrap();
    hub.on_str("agent:core:play", forwarding_listener("play", tx))
        .unwrap();

    broker
        .publish(
            "agent:command:agent-1",
            CommandMessage::new("agent:core:crash", Value::Null),
        )
        .await
        .unwrap();
    broker
        .publish(
            "agent:command:agent-1",
            CommandMessage::new("agent:core:play", Value::Null),
        )
        .await
        .unwrap();

    assert_eq!(recv(&mut rx).await.0, "after");
    assert_eq!(recv(&mut rx).await.0, "play");
}

#[tokio::test]
async fn nothing_dispatches_after_destroy() {
    let broker = MemoryBroker::new();
    let hub = start_hub(&broker, "agent-1", "project-1").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.on_str("agent:core:play", forwarding_listener("play", tx))
        .unwrap();

    hub.on_destroy().await;
    assert_eq!(broker.subscriber_count("agent:command:agent-1"), 0);
    assert_eq!(broker.subscriber_count("agent:command:project:project-1"), 0);

    for channel in ["agent:command:agent-1", "agent:command:project:project-1"] {
        broker
            .publish(channel, CommandMessage::new("agent:core:play", Value::Null))
            .await
            .unwrap();
    }
    assert!(stays_empty(&mut rx).await);
}

#[tokio::test]
async fn destroy_clears_registry_when_unsubscribe_fails() {
    let broker = MemoryBroker::new();
    let hub = CommandHub::start(
        agent("agent-1", "project-1"),
        Arc::new(StickyBroker {
            inner: broker.connect(),
        }),
        &HubConfig::default(),
    )
    .await
    .unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.on_str("agent:core:play", forwarding_listener("play", tx))
        .unwrap();

    hub.on_destroy().await;
    assert!(hub.list_all_events().is_empty());

    // still subscribed, but nothing is dispatched
    assert_eq!(broker.subscriber_count("agent:command:agent-1"), 1);
    broker
        .publish(
            "agent:command:agent-1",
            CommandMessage::new("agent:core:play", Value::Null),
        )
        .await
        .unwrap();
    assert!(stays_empty(&mut rx).await);
}

#[tokio::test]
async fn start_fails_on_closed_broker() {
    let broker = MemoryBroker::new();
    broker.close();
    let result = CommandHub::start(
        agent("agent-1", "project-1"),
        Arc::new(broker.connect()),
        &HubConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(spellhub::ApiError::Broker(_))));
}

#[tokio::test]
async fn start_rejects_zero_inbox_capacity() {
    let broker = MemoryBroker::new();
    let mut config = HubConfig::default();
    config.hub.inbox_capacity = 0;

    let result = CommandHub::start(
        agent("agent-1", "project-1"),
        Arc::new(broker.connect()),
        &config,
    )
    .await;
    assert!(matches!(result, Err(spellhub::ApiError::ConfigError(_))));
    assert_eq!(broker.subscriber_count("agent:command:agent-1"), 0);
}
