//! In-process broker

use super::contract::{Broker, MessageHandler, SubscriptionToken};
use crate::command::CommandMessage;
use crate::error::BrokerError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

struct Subscriber {
    id: u64,
    connection: u64,
    sender: mpsc::UnboundedSender<CommandMessage>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Bus {
    channels: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_subscription: AtomicU64,
    next_connection: AtomicU64,
    closed: AtomicBool,
}

/// Broker connection to an in-process message bus.
///
/// Every subscription gets its own delivery task, so messages on a channel are
/// handed to a subscriber in publish order without blocking the publisher.
/// [`MemoryBroker::connect`] opens another connection to the same bus, the way
/// each agent holds its own subscriber connection to a shared server.
#[derive(Clone)]
pub struct MemoryBroker {
    bus: Arc<Bus>,
    connection: u64,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let bus = Arc::new(Bus::default());
        let connection = bus.next_connection.fetch_add(1, Ordering::SeqCst);
        Self { bus, connection }
    }

    /// Open a new connection to the same bus
    pub fn connect(&self) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
            connection: self.bus.next_connection.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Subscriptions to `channel` across all connections
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.bus
            .channels
            .read()
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Close the bus for every connection and stop all deliveries
    pub fn close(&self) {
        self.bus.closed.store(true, Ordering::SeqCst);
        let channels = std::mem::take(&mut *self.bus.channels.write());
        for subscriber in channels.into_values().flatten() {
            subscriber.task.abort();
        }
        debug!("Memory broker closed");
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.bus.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn subscribe(
        &self,
        channel: &str,
        handler: MessageHandler,
    ) -> Result<SubscriptionToken, BrokerError> {
        self.ensure_open()?;
        let mut channels = self.bus.channels.write();
        let subscribers = channels.entry(channel.to_string()).or_default();
        if subscribers
            .iter()
            .any(|s| s.connection == self.connection)
        {
            return Err(BrokerError::AlreadySubscribed(channel.to_string()));
        }

        let id = self.bus.next_subscription.fetch_add(1, Ordering::SeqCst);
        let (sender, mut receiver) = mpsc::unbounded_channel::<CommandMessage>();
        let task = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                handler(message).await;
            }
        });
        subscribers.push(Subscriber {
            id,
            connection: self.connection,
            sender,
            task,
        });

        debug!(channel, subscription = id, "Subscribed");
        Ok(SubscriptionToken {
            channel: channel.to_string(),
            id,
        })
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut channels = self.bus.channels.write();
        let Some(subscribers) = channels.get_mut(channel) else {
            return Err(BrokerError::NotSubscribed(channel.to_string()));
        };
        let Some(position) = subscribers
            .iter()
            .position(|s| s.connection == self.connection)
        else {
            return Err(BrokerError::NotSubscribed(channel.to_string()));
        };

        let subscriber = subscribers.remove(position);
        subscriber.task.abort();
        if subscribers.is_empty() {
            channels.remove(channel);
        }
        debug!(channel, subscription = subscriber.id, "Unsubscribed");
        Ok(())
    }

    async fn publish(&self, channel: &str, message: CommandMessage) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let channels = self.bus.channels.read();
        let Some(subscribers) = channels.get(channel) else {
            trace!(channel, "Published to channel without subscribers");
            return Ok(());
        };
        for subscriber in subscribers {
            if subscriber.sender.send(message.clone()).is_err() {
                trace!(channel, subscription = subscriber.id, "Delivery task gone");
            }
        }
        Ok(())
    }
}
