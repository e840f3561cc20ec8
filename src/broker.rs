//! Channel broker
//!
//! Publish/subscribe over named channels. The hub consumes the [`Broker`]
//! contract; [`MemoryBroker`] implements it in process.

mod channels;
mod contract;
mod memory;

pub use channels::{agent_command_channel, project_command_channel};
pub use contract::{Broker, MessageHandler, SubscriptionToken};
pub use memory::MemoryBroker;
