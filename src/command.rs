//! Command Hub
//!
//! Validates `domain:subdomain:action` commands published for an agent and
//! routes them to the listeners registered for that exact event type.

mod event_type;
mod hub;
mod listener;
mod message;
mod registry;

pub use event_type::EventType;
pub use hub::CommandHub;
pub use listener::CommandListener;
pub use message::CommandMessage;
pub use registry::EventRegistry;
