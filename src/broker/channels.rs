//! Channel naming

use crate::config::ChannelConfig;

/// Channel that targets one agent: `<agent_prefix>:<agent_id>`
pub fn agent_command_channel(config: &ChannelConfig, agent_id: &str) -> String {
    format!("{}:{}", config.agent_prefix, agent_id)
}

/// Channel that targets every agent of a project: `<project_prefix>:<project_id>`
pub fn project_command_channel(config: &ChannelConfig, project_id: &str) -> String {
    format!("{}:{}", config.project_prefix, project_id)
}
