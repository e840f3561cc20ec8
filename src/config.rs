//! Configuration
//!
//! `HubConfig` is composed from built-in defaults, an optional `spellhub.toml`
//! and `SPELLHUB__*` environment variables (see [`ConfigLoader`]).

pub mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

use crate::event::FinishPolicy;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// File name looked up in a config directory
pub const CONFIG_FILE_NAME: &str = "spellhub.toml";

/// Environment variable prefix for config overrides
pub const ENV_PREFIX: &str = "SPELLHUB";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub channels: ChannelConfig,

    #[serde(default)]
    pub hub: CommandHubConfig,

    #[serde(default)]
    pub event_store: EventStoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Broker channel naming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Prefix of the channel that targets a single agent
    #[serde(default = "default_agent_prefix")]
    pub agent_prefix: String,

    /// Prefix of the channel that targets every agent of a project
    #[serde(default = "default_project_prefix")]
    pub project_prefix: String,
}

fn default_agent_prefix() -> String {
    "agent:command".to_string()
}

fn default_project_prefix() -> String {
    "agent:command:project".to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            agent_prefix: default_agent_prefix(),
            project_prefix: default_project_prefix(),
        }
    }
}

/// Command hub settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandHubConfig {
    /// Capacity of the inbox between broker delivery and the dispatch task
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

fn default_inbox_capacity() -> usize {
    1024
}

impl Default for CommandHubConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: default_inbox_capacity(),
        }
    }
}

/// Event store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStoreConfig {
    /// Limit used by `query_events` when the caller passes none
    #[serde(default = "default_query_limit")]
    pub default_query_limit: usize,

    /// How `finish()` treats a call with no pending async node
    #[serde(default)]
    pub finish_policy: FinishPolicy,

    /// How long a new `runEvent` waits for the previous event to settle
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
}

fn default_query_limit() -> usize {
    100
}

fn default_settle_timeout_ms() -> u64 {
    30_000
}

impl EventStoreConfig {
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            default_query_limit: default_query_limit(),
            finish_policy: FinishPolicy::default(),
            settle_timeout_ms: default_settle_timeout_ms(),
        }
    }
}

impl HubConfig {
    /// Check values serde cannot reject on its own
    pub fn validate(&self) -> Result<(), String> {
        if self.channels.agent_prefix.trim().is_empty() {
            return Err("channels.agent_prefix cannot be empty".to_string());
        }
        if self.channels.project_prefix.trim().is_empty() {
            return Err("channels.project_prefix cannot be empty".to_string());
        }
        if self.channels.agent_prefix == self.channels.project_prefix {
            return Err("agent and project channel prefixes must differ".to_string());
        }
        if self.hub.inbox_capacity == 0 {
            return Err("hub.inbox_capacity must be greater than 0".to_string());
        }
        if self.event_store.default_query_limit == 0 {
            return Err("event_store.default_query_limit must be greater than 0".to_string());
        }
        if self.event_store.settle_timeout_ms == 0 {
            return Err("event_store.settle_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}
