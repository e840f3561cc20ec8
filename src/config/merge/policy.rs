//! Built-in defaults every composed config starts from.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;

/// Builder seeded with the default values of every top-level section.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("channels.agent_prefix", "agent:command")?
        .set_default("channels.project_prefix", "agent:command:project")?
        .set_default("hub.inbox_capacity", 1024_i64)?
        .set_default("event_store.default_query_limit", 100_i64)?
        .set_default("event_store.finish_policy", "lenient")?
        .set_default("event_store.settle_timeout_ms", 30_000_i64)
}
