//! Per-agent command hub.

use super::event_type::EventType;
use super::listener::CommandListener;
use super::message::CommandMessage;
use super::registry::EventRegistry;
use crate::agent::Agent;
use crate::broker::{agent_command_channel, project_command_channel, Broker, MessageHandler};
use crate::config::HubConfig;
use crate::error::ApiError;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Routes commands published for one agent to its registered listeners.
///
/// The hub subscribes to the agent channel and the project channel. Both
/// subscriptions feed one bounded inbox drained by a single dispatch task, so
/// commands are dispatched in delivery order and never concurrently.
pub struct CommandHub {
    agent: Arc<Agent>,
    broker: Arc<dyn Broker>,
    registry: Arc<RwLock<EventRegistry>>,
    agent_channel: String,
    project_channel: String,
    shutdown: Arc<Notify>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl CommandHub {
    /// Subscribe both command channels of `agent` and start dispatching.
    pub async fn start(
        agent: Arc<Agent>,
        broker: Arc<dyn Broker>,
        config: &HubConfig,
    ) -> Result<Self, ApiError> {
        config.validate().map_err(ApiError::ConfigError)?;
        let agent_channel = agent_command_channel(&config.channels, agent.id());
        let project_channel = project_command_channel(&config.channels, agent.project_id());
        let registry = Arc::new(RwLock::new(EventRegistry::new()));
        let shutdown = Arc::new(Notify::new());

        let (inbox_tx, inbox_rx) = mpsc::channel::<CommandMessage>(config.hub.inbox_capacity);
        let dispatcher = tokio::spawn(
            Self::dispatch_loop(
                Arc::clone(&agent),
                Arc::clone(&registry),
                inbox_rx,
                Arc::clone(&shutdown),
            )
            .instrument(agent.span().clone()),
        );

        let handler: MessageHandler = Arc::new(move |message: CommandMessage| {
            let inbox = inbox_tx.clone();
            async move {
                if inbox.send(message).await.is_err() {
                    debug!("Command inbox closed, message dropped");
                }
            }
            .boxed()
        });

        if let Err(e) = broker.subscribe(&agent_channel, Arc::clone(&handler)).await {
            dispatcher.abort();
            return Err(e.into());
        }
        if let Err(e) = broker.subscribe(&project_channel, handler).await {
            if let Err(cleanup) = broker.unsubscribe(&agent_channel).await {
                warn!(channel = %agent_channel, error = %cleanup, "Failed to roll back subscription");
            }
            dispatcher.abort();
            return Err(e.into());
        }

        info!(
            agent_id = %agent.id(),
            agent_channel = %agent_channel,
            project_channel = %project_channel,
            "Command hub started"
        );

        Ok(Self {
            agent,
            broker,
            registry,
            agent_channel,
            project_channel,
            shutdown,
            dispatcher: Mutex::new(Some(dispatcher)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn agent_channel(&self) -> &str {
        &self.agent_channel
    }

    pub fn project_channel(&self) -> &str {
        &self.project_channel
    }

    /// Register a listener for every `(action, listener)` under `domain:subdomain:action`.
    ///
    /// Nothing is registered when any resulting event type is invalid.
    pub fn register_domain<I, A>(
        &self,
        domain: &str,
        subdomain: &str,
        commands: I,
    ) -> Result<(), ApiError>
    where
        I: IntoIterator<Item = (A, CommandListener)>,
        A: Into<String>,
    {
        self.ensure_open()?;
        let entries = commands
            .into_iter()
            .map(|(action, listener)| {
                EventType::new(domain, subdomain, action).map(|event_type| (event_type, listener))
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        let mut registry = self.registry.write();
        for (event_type, listener) in entries {
            debug!(agent_id = %self.agent.id(), event_type = %event_type, "Registered command");
            registry.on(event_type, listener);
        }
        Ok(())
    }

    /// `register_domain("plugin", plugin_name, actions)`
    pub fn register_plugin<I, A>(&self, plugin_name: &str, actions: I) -> Result<(), ApiError>
    where
        I: IntoIterator<Item = (A, CommandListener)>,
        A: Into<String>,
    {
        self.register_domain("plugin", plugin_name, actions)
    }

    pub fn on(&self, event_type: EventType, listener: CommandListener) -> Result<(), ApiError> {
        self.ensure_open()?;
        debug!(agent_id = %self.agent.id(), event_type = %event_type, "Registered command");
        self.registry.write().on(event_type, listener);
        Ok(())
    }

    /// `on` with a raw `domain:subdomain:action` string
    pub fn on_str(&self, event_type: &str, listener: CommandListener) -> Result<(), ApiError> {
        self.on(EventType::parse(event_type)?, listener)
    }

    /// Remove the first registration of `listener`; false when absent.
    pub fn off(&self, event_type: &EventType, listener: &CommandListener) -> bool {
        self.registry.write().off(event_type, listener)
    }

    pub fn list_all_events(&self) -> Vec<EventType> {
        self.registry.read().keys()
    }

    /// Validate `message` and run every listener of its event type.
    ///
    /// An invalid command is logged and dropped. Each listener runs in
    /// registration order; a failing or panicking listener is logged and the
    /// rest still run. Returns the number of listeners that completed.
    pub async fn handle_incoming_command(&self, message: CommandMessage) -> usize {
        dispatch(&self.agent, &self.registry, message).await
    }

    /// Unsubscribe both channels and clear the registry.
    ///
    /// Unsubscribe failures are logged. A listener that is already running
    /// completes; nothing is dispatched afterwards.
    pub async fn on_destroy(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        for channel in [&self.agent_channel, &self.project_channel] {
            if let Err(e) = self.broker.unsubscribe(channel).await {
                error!(
                    agent_id = %self.agent.id(),
                    channel = %channel,
                    error = %e,
                    "Failed to unsubscribe command channel"
                );
            }
        }

        self.registry.write().clear();
        self.shutdown.notify_one();
        self.dispatcher.lock().take();

        info!(agent_id = %self.agent.id(), "Command hub destroyed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ApiError> {
        if self.is_closed() {
            return Err(ApiError::HubClosed(self.agent.id().to_string()));
        }
        Ok(())
    }

    async fn dispatch_loop(
        agent: Arc<Agent>,
        registry: Arc<RwLock<EventRegistry>>,
        mut inbox: mpsc::Receiver<CommandMessage>,
        shutdown: Arc<Notify>,
    ) {
        debug!("Dispatch task started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.notified() => break,
                message = inbox.recv() => match message {
                    Some(message) => {
                        dispatch(&agent, &registry, message).await;
                    }
                    None => break,
                },
            }
        }
        debug!("Dispatch task stopped");
    }
}

impl Drop for CommandHub {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

async fn dispatch(
    agent: &Arc<Agent>,
    registry: &RwLock<EventRegistry>,
    message: CommandMessage,
) -> usize {
    let event_type = match EventType::parse(&message.command) {
        Ok(event_type) => event_type,
        Err(e) => {
            error!(
                agent_id = %agent.id(),
                command = %message.command,
                error = %e,
                "Invalid command received"
            );
            return 0;
        }
    };

    let listeners = registry.read().listeners(&event_type);
    if listeners.is_empty() {
        debug!(agent_id = %agent.id(), event_type = %event_type, "No listener for command");
        return 0;
    }

    let mut completed = 0;
    for (index, listener) in listeners.iter().enumerate() {
        let data = message.data.clone();
        let agent = Arc::clone(agent);
        let call = async move { listener.call(data, agent).await };

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(())) => completed += 1,
            Ok(Err(e)) => {
                let reason = format!("{:#}", e);
                error!(
                    event_type = %event_type,
                    listener = index,
                    error = %reason,
                    "Command listener failed"
                );
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(
                    event_type = %event_type,
                    listener = index,
                    panic = %reason,
                    "Command listener panicked"
                );
            }
        }
    }
    completed
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
