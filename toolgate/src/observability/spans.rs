//! Per-call span fields and timing.

use serde::Serialize;
use std::time::Instant;
use tracing::Span;

/// What is known about one gated call at a point in its lifecycle.
///
/// Serialized as the payload of every gate event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvocationSpanAttributes {
    /// Target function.
    pub function: String,
    /// Model-assigned call ID.
    pub call_id: String,
    /// Owning session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// The decision, once made.
    pub approved: Option<bool>,
    /// Execution time, once the function returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationSpanAttributes {
    /// Starts the attributes of a call that reached the gate.
    #[must_use]
    pub fn new(function: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            call_id: call_id.into(),
            ..Default::default()
        }
    }

    /// Sets the session.
    #[must_use]
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Sets the decision.
    #[must_use]
    pub fn with_approved(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    /// Sets the execution time.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the failure message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Opens the `tool_call` span the gate runs each call in.
    ///
    /// `approved` starts empty and is recorded once the decision arrives.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "tool_call",
            function = %self.function,
            call_id = %self.call_id,
            session = self.session_id.as_deref().unwrap_or_default(),
            approved = tracing::field::Empty,
        )
    }

    /// Returns the event payload.
    #[must_use]
    pub fn to_event_data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Wall-clock timer for a named step.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts timing.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Milliseconds since [`start`](Self::start).
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_data_grows_with_lifecycle() {
        let invoked = InvocationSpanAttributes::new("get_weather", "call_1").with_session_id("s-1");
        assert_eq!(
            invoked.to_event_data(),
            serde_json::json!({
                "function": "get_weather",
                "call_id": "call_1",
                "session_id": "s-1",
                "approved": null
            })
        );

        let done = invoked.with_approved(true).with_duration_ms(12.5);
        let data = done.to_event_data();
        assert_eq!(data["approved"], true);
        assert_eq!(data["duration_ms"], 12.5);
        assert!(data.get("error").is_none());
    }

    #[test]
    fn test_span_can_be_entered_without_subscriber() {
        let span = InvocationSpanAttributes::new("get_weather", "call_1").span();
        let _entered = span.enter();
        span.record("approved", true);
    }

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("execute");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.elapsed_ms() >= 5.0);
        assert_eq!(timer.name(), "execute");
    }
}
