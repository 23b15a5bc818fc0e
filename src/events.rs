//! Event log for the ClusterLab simulator.
//!
//! Every state-changing operation emits a human-readable, timestamped
//! message with a severity flag. The presentation layer only displays these;
//! it does not interpret them. Live subscribers receive events over a
//! broadcast channel, and a bounded in-memory history supports replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{error, info};

/// Default history bound.
const DEFAULT_CAPACITY: usize = 1024;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
}

/// A single emitted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID.
    pub id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

impl Event {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            severity,
            message: message.into(),
        }
    }

    /// Render the event the way the operation console shows it.
    pub fn render(&self) -> String {
        let tag = match self.severity {
            Severity::Info => "INFO",
            Severity::Error => "ERROR",
        };
        format!("[{}] {} | {}", self.timestamp.format("%H:%M:%S"), tag, self.message)
    }
}

/// Append-only event log with broadcast fan-out.
#[derive(Clone)]
pub struct EventLog {
    history: Arc<Mutex<VecDeque<Event>>>,
    capacity: usize,
    tx: broadcast::Sender<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(16));
        Self {
            history: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
            tx,
        }
    }

    /// Emit an informational event.
    pub fn info(&self, message: impl Into<String>) {
        let event = Event::new(Severity::Info, message);
        info!(target: "clusterlab::events", "{}", event.message);
        self.push(event);
    }

    /// Emit an error event.
    pub fn error(&self, message: impl Into<String>) {
        let event = Event::new(Severity::Error, message);
        error!(target: "clusterlab::events", "{}", event.message);
        self.push(event);
    }

    fn push(&self, event: Event) {
        {
            let mut history = self.history.lock().expect("event history lock poisoned");
            if history.len() == self.capacity {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        // No receivers is fine; history still records the event.
        let _ = self.tx.send(event);
    }

    /// Subscribe to live events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Snapshot of the recorded history, oldest first.
    pub fn history(&self) -> Vec<Event> {
        self.history
            .lock()
            .expect("event history lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Clear the history (full reset only).
    pub fn clear(&self) {
        self.history
            .lock()
            .expect("event history lock poisoned")
            .clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
