//! Proposed calls and their outcomes.

use super::ToolFunction;
use crate::cancellation::CancellationToken;
use crate::errors::GateError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Named arguments of a call, in the order the model produced them.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// Text reported back to the model for a call that was not executed.
pub const NOT_EXECUTED_NOTICE: &str =
    "The function call was not executed because it was not approved.";

/// A raw tool call as emitted by the model, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The call ID assigned by the model.
    pub id: String,
    /// The requested function name.
    pub name: String,
    /// The arguments as a raw JSON string.
    pub arguments: String,
}

impl ToolCallRequest {
    /// Creates a new tool call request.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// A function call proposed by the model, bound to its target.
///
/// Immutable once built; the gate only reads it.
#[derive(Clone)]
pub struct ProposedCall {
    call_id: String,
    arguments: Arguments,
    function: Arc<dyn ToolFunction>,
    cancellation: Arc<CancellationToken>,
}

impl ProposedCall {
    /// Creates a proposed call.
    #[must_use]
    pub fn new(
        call_id: impl Into<String>,
        function: Arc<dyn ToolFunction>,
        arguments: Arguments,
        cancellation: Arc<CancellationToken>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            arguments,
            function,
            cancellation,
        }
    }

    /// Returns the call ID.
    #[must_use]
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Returns the target function name.
    #[must_use]
    pub fn function_name(&self) -> &str {
        self.function.name()
    }

    /// Returns the arguments.
    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Returns a single argument by name.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&serde_json::Value> {
        self.arguments.get(name)
    }

    /// Returns the target function.
    #[must_use]
    pub fn function(&self) -> &Arc<dyn ToolFunction> {
        &self.function
    }

    /// Returns the cancellation token inherited from the request.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Runs the target function with this call's arguments and cancellation.
    ///
    /// Function errors come back as [`GateError::Execution`] holding the
    /// original error.
    pub async fn execute(&self) -> Result<serde_json::Value, GateError> {
        self.function
            .invoke(&self.arguments, &self.cancellation)
            .await
            .map_err(GateError::Execution)
    }

    /// Returns a JSON summary suitable for events and confirmation prompts.
    #[must_use]
    pub fn to_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "call_id": self.call_id,
            "function": self.function_name(),
            "arguments": self.arguments,
        })
    }
}

impl std::fmt::Debug for ProposedCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProposedCall")
            .field("call_id", &self.call_id)
            .field("function", &self.function_name())
            .field("arguments", &self.arguments)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

/// Outcome of a gated invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum InvocationResult {
    /// The call was approved and returned this value.
    Completed(serde_json::Value),
    /// The call was denied and never ran.
    NotExecuted,
}

impl InvocationResult {
    /// Returns true if the function ran.
    #[must_use]
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns the function's value, if it ran.
    #[must_use]
    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Completed(value) => Some(value),
            Self::NotExecuted => None,
        }
    }

    /// Renders the outcome as the content of a tool message.
    ///
    /// String values go through as plain text; any other value is
    /// serialized as JSON.
    #[must_use]
    pub fn to_message_content(&self) -> String {
        match self {
            Self::Completed(serde_json::Value::String(s)) => s.clone(),
            Self::Completed(value) => value.to_string(),
            Self::NotExecuted => NOT_EXECUTED_NOTICE.to_string(),
        }
    }
}
