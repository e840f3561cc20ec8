//! Event registry: event type to ordered listeners.

use super::event_type::EventType;
use super::listener::CommandListener;
use std::collections::BTreeMap;

/// Listeners per event type, in registration order.
///
/// Registering the same listener twice keeps both entries.
#[derive(Debug, Default)]
pub struct EventRegistry {
    listeners: BTreeMap<EventType, Vec<CommandListener>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, event_type: EventType, listener: CommandListener) {
        self.listeners.entry(event_type).or_default().push(listener);
    }

    /// Remove the first registration of `listener` under `event_type`.
    ///
    /// Returns false when it was not registered.
    pub fn off(&mut self, event_type: &EventType, listener: &CommandListener) -> bool {
        let Some(listeners) = self.listeners.get_mut(event_type) else {
            return false;
        };
        let Some(position) = listeners.iter().position(|l| l.ptr_eq(listener)) else {
            return false;
        };
        listeners.remove(position);
        if listeners.is_empty() {
            self.listeners.remove(event_type);
        }
        true
    }

    /// Snapshot of the listeners for `event_type`
    pub fn listeners(&self, event_type: &EventType) -> Vec<CommandListener> {
        self.listeners.get(event_type).cloned().unwrap_or_default()
    }

    /// Registered event types, sorted
    pub fn keys(&self) -> Vec<EventType> {
        self.listeners.keys().cloned().collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
