//! Lifecycle events for gated invocations.
//!
//! The gated invoker reports each step of a call through an [`EventSink`]:
//!
//! | event                | when                                          |
//! |----------------------|-----------------------------------------------|
//! | `tool.invoked`       | a proposed call reached the gate              |
//! | `approval.requested` | handlers were asked for a decision            |
//! | `approval.decided`   | a decision arrived                            |
//! | `tool.not_executed`  | the call was denied and skipped               |
//! | `tool.started`       | the function is about to run                  |
//! | `tool.completed`     | the function returned a value                 |
//! | `tool.failed`        | the decision or the function failed           |

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// Event type names.
pub mod event_types {
    /// A proposed call reached the gate.
    pub const TOOL_INVOKED: &str = "tool.invoked";
    /// Handlers were asked for a decision.
    pub const APPROVAL_REQUESTED: &str = "approval.requested";
    /// A decision arrived.
    pub const APPROVAL_DECIDED: &str = "approval.decided";
    /// The call was denied and skipped.
    pub const TOOL_NOT_EXECUTED: &str = "tool.not_executed";
    /// The function is about to run.
    pub const TOOL_STARTED: &str = "tool.started";
    /// The function returned a value.
    pub const TOOL_COMPLETED: &str = "tool.completed";
    /// The decision or the function failed.
    pub const TOOL_FAILED: &str = "tool.failed";
}
