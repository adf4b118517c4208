//! Where gate lifecycle events go.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn, Level};

/// Receives lifecycle events from the gated invoker.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers an event, waiting for the sink if it needs to.
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Delivers an event without waiting.
    ///
    /// Must never fail; sinks log and drop what they cannot deliver.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// Drops every event. Used when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// Writes events to `tracing`.
///
/// `tool.failed` is always written at WARN regardless of the configured level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingEventSink {
    /// Logs at `level`. Only INFO and DEBUG are distinguished.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Logs at DEBUG.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn write(&self, event_type: &str, data: Option<&serde_json::Value>) {
        let data = data.map(ToString::to_string).unwrap_or_default();
        if event_type == super::event_types::TOOL_FAILED {
            warn!(event = event_type, data = %data, "Gate event");
        } else if self.level == Level::DEBUG {
            debug!(event = event_type, data = %data, "Gate event");
        } else {
            info!(event = event_type, data = %data, "Gate event");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.write(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.write(event_type, data.as_ref());
    }
}

/// An event captured by [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    /// Event type, one of [`event_types`](super::event_types).
    pub event_type: String,
    /// Event payload.
    pub data: Option<serde_json::Value>,
    /// When the sink received it.
    pub received_at: DateTime<Utc>,
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event received.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Returns the event types in arrival order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.event_type.clone()).collect()
    }

    /// Returns the events whose type starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Returns the number of events received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Forgets every event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.lock().push(RecordedEvent {
            event_type: event_type.to_string(),
            data,
            received_at: Utc::now(),
        });
    }
}
