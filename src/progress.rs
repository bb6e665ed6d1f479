//! # Progress Events
//!
//! Liveness signals sent to the surrounding task framework while a
//! long-running external process is being waited on.

use std::sync::Mutex;

use tracing::debug;

/// Receiver of task events (`task-progress` and friends).
pub trait ProgressReporter: Send + Sync {
    fn send_event(&self, event: &str);
}

/// Reporter that only records events in the worker log.
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn send_event(&self, event: &str) {
        debug!(event, "task event");
    }
}

/// Reporter that keeps every event it receives, in order.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }
}

impl ProgressReporter for RecordingReporter {
    fn send_event(&self, event: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.to_string());
        }
    }
}
