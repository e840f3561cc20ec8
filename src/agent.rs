//! Agent identity
//!
//! An `Agent` is the identity context the hub and the event store route and log
//! for. It is owned by the process running it and shared with the components
//! as `Arc<Agent>`.

use crate::types::{AgentId, ProjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::Span;

/// Serializable agent description, as loaded from the agents table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: AgentId,
    pub project_id: ProjectId,
    #[serde(default)]
    pub name: Option<String>,
    /// Secrets available to the agent's graph nodes and plugins
    #[serde(default)]
    pub secrets: HashMap<String, String>,
}

/// A running agent.
pub struct Agent {
    id: AgentId,
    project_id: ProjectId,
    name: String,
    secrets: HashMap<String, String>,
    span: Span,
}

impl Agent {
    /// Create an agent with no secrets
    pub fn new(id: impl Into<AgentId>, project_id: impl Into<ProjectId>) -> Self {
        Self::from_config(AgentConfig {
            id: id.into(),
            project_id: project_id.into(),
            name: None,
            secrets: HashMap::new(),
        })
    }

    pub fn from_config(config: AgentConfig) -> Self {
        let name = config.name.unwrap_or_else(|| config.id.clone());
        let span = tracing::info_span!(
            "agent",
            agent_id = %config.id,
            project_id = %config.project_id,
        );
        Self {
            id: config.id,
            project_id: config.project_id,
            name,
            secrets: config.secrets,
            span,
        }
    }

    /// Attach a secret, replacing any previous value under the same key
    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn secret(&self, key: &str) -> Option<&str> {
        self.secrets.get(key).map(String::as_str)
    }

    /// Span every component logs under for this agent.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

// Secrets stay out of Debug output.
impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("project_id", &self.project_id)
            .field("name", &self.name)
            .field("secrets", &self.secrets.len())
            .finish()
    }
}
