//! The event handed to an agent's graph.

use crate::types::StateKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An external occurrence (chat message, timer tick, webhook) driving one
/// graph execution.
///
/// Fields not modelled here (content, observer, entities, connector-specific
/// data) are kept in `fields` and serialized inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub sender: String,
    pub channel: String,
    #[serde(default)]
    pub connector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Key of the persisted per-event graph state
    pub state_key: StateKey,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Event {
    pub fn new(
        sender: impl Into<String>,
        channel: impl Into<String>,
        state_key: impl Into<StateKey>,
    ) -> Self {
        Self {
            sender: sender.into(),
            channel: channel.into(),
            connector: String::new(),
            agent_id: None,
            state_key: state_key.into(),
            fields: Map::new(),
        }
    }

    pub fn with_connector(mut self, connector: impl Into<String>) -> Self {
        self.connector = connector.into();
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Look up a field by its wire name, named fields first.
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            "sender" => Some(Value::String(self.sender.clone())),
            "channel" => Some(Value::String(self.channel.clone())),
            "connector" => Some(Value::String(self.connector.clone())),
            "agentId" => self.agent_id.clone().map(Value::String),
            "stateKey" => Some(Value::String(self.state_key.clone())),
            other => self.fields.get(other).cloned(),
        }
    }
}
