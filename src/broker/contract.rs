use crate::command::CommandMessage;
use crate::error::BrokerError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Callback a broker invokes for each message delivered on a channel.
///
/// The next message on the subscription is not delivered until the returned
/// future completes.
pub type MessageHandler = Arc<dyn Fn(CommandMessage) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handle of one channel subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    pub channel: String,
    pub id: u64,
}

/// Publish/subscribe transport for command messages.
///
/// Delivery is at-least-once and FIFO per channel. Subscriptions belong to the
/// broker connection that made them: `unsubscribe` only drops this
/// connection's subscriptions to the channel.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn subscribe(
        &self,
        channel: &str,
        handler: MessageHandler,
    ) -> Result<SubscriptionToken, BrokerError>;

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError>;

    async fn publish(
        &self,
        channel: &str,
        message: CommandMessage,
    ) -> Result<(), BrokerError>;
}
