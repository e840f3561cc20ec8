use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message published on an agent or project command channel.
///
/// `command` is kept raw; it is validated when the hub dispatches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command: String,
    #[serde(default)]
    pub data: Value,
}

impl CommandMessage {
    pub fn new(command: impl Into<String>, data: Value) -> Self {
        Self {
            command: command.into(),
            data,
        }
    }
}
