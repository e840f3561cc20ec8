//! Memory-backed historical graph events.

use crate::error::ApiError;
use crate::event::{Event, EventHistory, GraphEventQuery};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Append-only list of graph event records answering [`GraphEventQuery`]s.
///
/// A record matches when its `agentId` equals the query's, its `eventType` is
/// one of `eventTypes` (any type when the list is empty) and every query
/// property equals the record's field of the same name. Results are newest
/// first and capped at `$limit`.
#[derive(Default)]
pub struct MemoryEventHistory {
    records: RwLock<Vec<Value>>,
    find_calls: AtomicUsize,
    last_query: RwLock<Option<GraphEventQuery>>,
}

impl MemoryEventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw record
    pub fn record(&self, record: Value) {
        self.records.write().push(record);
    }

    /// Append a record for `event`, observed by `agent_id` as `event_type`
    pub fn record_event(
        &self,
        agent_id: &str,
        event_type: &str,
        event: &Event,
        from_user: Option<&str>,
        to_user: Option<&str>,
    ) {
        let mut record = Map::new();
        record.insert("agentId".to_string(), Value::from(agent_id));
        record.insert("eventType".to_string(), Value::from(event_type));
        record.insert("sender".to_string(), Value::from(event.sender.as_str()));
        record.insert("channel".to_string(), Value::from(event.channel.as_str()));
        record.insert("connector".to_string(), Value::from(event.connector.as_str()));
        if let Some(from) = from_user {
            record.insert("fromUser".to_string(), Value::from(from));
        }
        if let Some(to) = to_user {
            record.insert("toUser".to_string(), Value::from(to));
        }
        for (key, value) in &event.fields {
            record.entry(key.clone()).or_insert_with(|| value.clone());
        }
        record.insert("createdAt".to_string(), Value::from(Utc::now().to_rfc3339()));
        self.record(Value::Object(record));
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<GraphEventQuery> {
        self.last_query.read().clone()
    }

    fn matches(record: &Value, query: &GraphEventQuery) -> bool {
        if record.get("agentId").and_then(Value::as_str) != Some(query.agent_id.as_str()) {
            return false;
        }
        if !query.event_types.is_empty() {
            let event_type = record.get("eventType").and_then(Value::as_str);
            if !query
                .event_types
                .iter()
                .any(|t| Some(t.as_str()) == event_type)
            {
                return false;
            }
        }
        query
            .properties
            .iter()
            .all(|(key, expected)| record.get(key) == Some(expected))
    }
}

#[async_trait]
impl EventHistory for MemoryEventHistory {
    async fn find(&self, query: &GraphEventQuery) -> Result<Vec<Value>, ApiError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.write() = Some(query.clone());

        let records = self.records.read();
        Ok(records
            .iter()
            .rev()
            .filter(|record| Self::matches(record, query))
            .take(query.limit)
            .cloned()
            .collect())
    }
}
