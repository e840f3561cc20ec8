//! Historical event queries correlated with the in-flight event.

use super::payload::Event;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Property of the in-flight event a query can be correlated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventProperty {
    Sender,
    AgentId,
    Connector,
    Channel,
    /// Matches events whose `fromUser` is the current sender
    FromUser,
    /// Matches events whose `toUser` is the current sender
    ToUser,
}

impl EventProperty {
    /// Name used by graph nodes and the editor
    pub fn as_str(&self) -> &'static str {
        match self {
            EventProperty::Sender => "sender",
            EventProperty::AgentId => "agentId",
            EventProperty::Connector => "connector",
            EventProperty::Channel => "channel",
            EventProperty::FromUser => "from user",
            EventProperty::ToUser => "to user",
        }
    }

    /// Key in the issued query
    fn query_key(&self) -> &'static str {
        match self {
            EventProperty::FromUser => "fromUser",
            EventProperty::ToUser => "toUser",
            other => other.as_str(),
        }
    }

    /// Event field the value is taken from
    fn source_field(&self) -> &'static str {
        match self {
            EventProperty::FromUser | EventProperty::ToUser => "sender",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for EventProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventProperty {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sender" => Ok(EventProperty::Sender),
            "agentId" => Ok(EventProperty::AgentId),
            "connector" => Ok(EventProperty::Connector),
            "channel" => Ok(EventProperty::Channel),
            "from user" => Ok(EventProperty::FromUser),
            "to user" => Ok(EventProperty::ToUser),
            other => Err(ApiError::InvalidEventProperty(other.to_string())),
        }
    }
}

/// Query issued to the historical-event service.
///
/// Serializes as `{agentId, eventTypes, ...properties, $limit}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEventQuery {
    pub agent_id: String,
    pub event_types: Vec<String>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
    #[serde(rename = "$limit")]
    pub limit: usize,
}

impl GraphEventQuery {
    /// Build the query for `event`.
    ///
    /// Properties the event does not carry are left out. An extracted
    /// `agentId` replaces the store's agent id.
    pub fn for_event(
        agent_id: &str,
        event: &Event,
        property_keys: &[EventProperty],
        message_types: &[String],
        limit: usize,
    ) -> Self {
        let mut agent_id = agent_id.to_string();
        let mut properties = Map::new();

        for key in property_keys {
            let Some(value) = event.field(key.source_field()) else {
                continue;
            };
            if *key == EventProperty::AgentId {
                if let Value::String(id) = value {
                    agent_id = id;
                }
                continue;
            }
            properties.insert(key.query_key().to_string(), value);
        }

        Self {
            agent_id,
            event_types: message_types.to_vec(),
            properties,
            limit,
        }
    }
}
