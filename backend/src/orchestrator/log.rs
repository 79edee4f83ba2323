//! Record of every event the coordinator routed

use crate::core::SimTime;
use crate::models::ExternalEvent;
use serde::{Deserialize, Serialize};

/// One delivery `(source, port) → (target, port)` at a given time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedEvent {
    pub time: SimTime,
    pub source: String,
    pub target: String,
    /// Event as received, with the target's input port
    pub event: ExternalEvent,
}

/// Append-only event log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<RoutedEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, event: RoutedEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[RoutedEvent] {
        &self.events
    }

    /// Deliveries at `time` (within tolerance)
    pub fn events_at(&self, time: SimTime) -> Vec<&RoutedEvent> {
        self.events
            .iter()
            .filter(|e| e.time.approx_eq(time))
            .collect()
    }

    /// Deliveries into `target`'s `port`
    pub fn events_to(&self, target: &str, port: &str) -> Vec<&RoutedEvent> {
        self.events
            .iter()
            .filter(|e| e.target == target && e.event.on_port(port))
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
