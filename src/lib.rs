//! Spellhub: agent command routing and in-flight event orchestration
//!
//! A running agent owns a [`command::CommandHub`], which routes
//! `domain:subdomain:action` commands published on the agent's channels to
//! registered listeners, and an [`event::EventStore`], which tracks the one
//! event its graph is processing, including graph steps suspended on
//! asynchronous work. [`runtime::AgentRuntime`] wires the two together.

pub mod agent;
pub mod broker;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod runtime;
pub mod services;
pub mod tooling;
pub mod types;

pub use agent::Agent;
pub use command::{CommandHub, CommandListener, CommandMessage, EventType};
pub use error::{ApiError, BrokerError};
pub use event::{EventStore, Status};
pub use runtime::{AgentRuntime, RuntimeServices};
