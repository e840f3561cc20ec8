//! Error types
//!
//! `ApiError` is the crate-wide error returned by hub, store and runtime
//! operations. Broker implementations report `BrokerError`.

use thiserror::Error;

/// Errors raised by a [`crate::broker::Broker`] implementation.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Not subscribed to channel: {0}")]
    NotSubscribed(String),

    #[error("Already subscribed to channel: {0}")]
    AlreadySubscribed(String),

    #[error("Broker connection error: {0}")]
    Connection(String),

    #[error("Broker is closed")]
    Closed,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid event type '{0}': expected domain:subdomain:action")]
    InvalidEventType(String),

    #[error("Unknown event property: {0}")]
    InvalidEventProperty(String),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("State service error: {0}")]
    StateService(String),

    #[error("Event history error: {0}")]
    EventHistory(String),

    #[error("Event store not initialized: call init() before set_event()")]
    NotInitialized,

    #[error("Event is missing a state key")]
    MissingStateKey,

    #[error("finish() called with no pending async node (status: {0})")]
    UnmatchedFinish(String),

    #[error("Command hub for agent {0} is closed")]
    HubClosed(String),

    #[error("Previous event still in flight (status: {0})")]
    EventInFlight(String),

    #[error("Graph execution failed: {0}")]
    Execution(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
