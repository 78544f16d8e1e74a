//! Mock flow-control listener for testing.

use crate::application::ports::ThrottleListener;
use parking_lot::Mutex;
use std::sync::Arc;

/// A flow-control transition seen by [`MockThrottleListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// The topic stopped admitting publishes
    Throttled(String),
    /// The topic admits publishes again
    Resumed(String),
}

/// Listener that records every transition it is told about.
///
/// Clones share the same record, so a test can hand one clone to a limiter
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MockThrottleListener {
    events: Arc<Mutex<Vec<FlowEvent>>>,
}

impl MockThrottleListener {
    /// Create a new mock listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded transitions, oldest first.
    pub fn events(&self) -> Vec<FlowEvent> {
        self.events.lock().clone()
    }

    /// Number of throttle notifications.
    pub fn throttled_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, FlowEvent::Throttled(_)))
            .count()
    }

    /// Number of resume notifications.
    pub fn resumed_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, FlowEvent::Resumed(_)))
            .count()
    }

    /// Topics named in the recorded transitions.
    pub fn topics(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|e| match e {
                FlowEvent::Throttled(t) | FlowEvent::Resumed(t) => t.clone(),
            })
            .collect()
    }

    /// Whether the last transition left the producer paused.
    pub fn is_paused(&self) -> bool {
        matches!(self.events.lock().last(), Some(FlowEvent::Throttled(_)))
    }

    /// Forget all recorded transitions.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ThrottleListener for MockThrottleListener {
    fn on_throttled(&self, topic: &str) {
        self.events
            .lock()
            .push(FlowEvent::Throttled(topic.to_string()));
    }

    fn on_resumed(&self, topic: &str) {
        self.events.lock().push(FlowEvent::Resumed(topic.to_string()));
    }
}
