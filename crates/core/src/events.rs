//! Observability sink for created/updated events.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

/// Receives structured events. Implementations must not influence apply decisions.
pub trait Recorder: Send + Sync {
    fn event(&self, reason: &str, message: &str);
    fn warning(&self, reason: &str, message: &str);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl Recorder for NoopRecorder {
    fn event(&self, _reason: &str, _message: &str) {}
    fn warning(&self, _reason: &str, _message: &str) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone)]
pub struct TracingRecorder {
    component: String,
}

impl TracingRecorder {
    pub fn new(component: &str) -> Self { Self { component: component.to_string() } }
}

impl Recorder for TracingRecorder {
    fn event(&self, reason: &str, message: &str) {
        info!(component = %self.component, reason, "{}", message);
    }

    fn warning(&self, reason: &str, message: &str) {
        warn!(component = %self.component, reason, "{}", message);
    }
}

/// Keeps events in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<Event>>,
}

impl MemoryRecorder {
    pub fn new() -> Self { Self::default() }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }

    fn push(&self, event_type: EventType, reason: &str, message: &str) {
        let ev = Event { event_type, reason: reason.to_string(), message: message.to_string() };
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(ev);
    }
}

impl Recorder for MemoryRecorder {
    fn event(&self, reason: &str, message: &str) { self.push(EventType::Normal, reason, message); }
    fn warning(&self, reason: &str, message: &str) { self.push(EventType::Warning, reason, message); }
}
