//! Validated `domain:subdomain:action` keys.

use crate::error::ApiError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = ':';

/// Key a command listener is registered under.
///
/// Always exactly three non-empty segments, none containing `:`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventType {
    domain: String,
    subdomain: String,
    action: String,
}

impl EventType {
    pub fn new(
        domain: impl Into<String>,
        subdomain: impl Into<String>,
        action: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let event_type = Self {
            domain: domain.into(),
            subdomain: subdomain.into(),
            action: action.into(),
        };
        let valid = [&event_type.domain, &event_type.subdomain, &event_type.action]
            .iter()
            .all(|segment| is_valid_segment(segment));
        if !valid {
            return Err(ApiError::InvalidEventType(event_type.to_string()));
        }
        Ok(event_type)
    }

    /// Parse a raw command string.
    pub fn parse(command: &str) -> Result<Self, ApiError> {
        let mut segments = command.split(SEPARATOR);
        match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(domain), Some(subdomain), Some(action), None) => {
                Self::new(domain, subdomain, action)
            }
            _ => Err(ApiError::InvalidEventType(command.to_string())),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(SEPARATOR)
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.domain, self.subdomain, self.action)
    }
}

impl FromStr for EventType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
