//! Error types for the toolgate crate.
//!
//! Denial of a proposed call is not an error: it surfaces as
//! [`InvocationResult::NotExecuted`](crate::tools::InvocationResult::NotExecuted).
//! Everything in this module is a failure the gate does not recover from
//! locally and hands back to the caller of the conversation turn.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// The main error type for gated function invocation.
#[derive(Debug, Error)]
pub enum GateError {
    /// The gate was wired without the context it needs.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A confirmation handler failed instead of resolving the decision.
    #[error("{0}")]
    Handler(#[from] HandlerError),

    /// The approved function itself failed. The original error is kept as-is.
    #[error(transparent)]
    Execution(anyhow::Error),

    /// The enclosing request was cancelled.
    #[error("Invocation cancelled: {0}")]
    Cancelled(String),

    /// No decision arrived within the configured timeout.
    #[error("Confirmation timed out for function '{function}' after {}ms", timeout.as_millis())]
    DecisionTimeout {
        /// The function awaiting confirmation.
        function: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// Every handle to the pending confirmation was dropped unresolved.
    #[error("Confirmation for function '{function}' was dropped without a decision")]
    DecisionAbandoned {
        /// The function awaiting confirmation.
        function: String,
    },

    /// The underlying chat client failed.
    #[error("Chat client error: {0}")]
    Client(String),
}

impl GateError {
    /// Wraps an error returned by a tool function.
    #[must_use]
    pub fn execution(err: impl Into<anyhow::Error>) -> Self {
        Self::Execution(err.into())
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    /// Creates a chat client error.
    #[must_use]
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }

    /// Returns true for the fatal wiring error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        match self {
            Self::Configuration(err) => {
                map.insert("type".to_string(), serde_json::json!("ConfigurationError"));
                map.insert("parameter".to_string(), serde_json::json!(err.parameter));
            }
            Self::Handler(err) => {
                map.insert("type".to_string(), serde_json::json!("HandlerError"));
                map.insert("function".to_string(), serde_json::json!(err.function));
            }
            Self::Execution(_) => {
                map.insert("type".to_string(), serde_json::json!("ExecutionError"));
            }
            Self::Cancelled(reason) => {
                map.insert("type".to_string(), serde_json::json!("Cancelled"));
                map.insert("reason".to_string(), serde_json::json!(reason));
            }
            Self::DecisionTimeout { function, timeout } => {
                map.insert("type".to_string(), serde_json::json!("DecisionTimeout"));
                map.insert("function".to_string(), serde_json::json!(function));
                map.insert(
                    "timeout_ms".to_string(),
                    serde_json::json!(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)),
                );
            }
            Self::DecisionAbandoned { function } => {
                map.insert("type".to_string(), serde_json::json!("DecisionAbandoned"));
                map.insert("function".to_string(), serde_json::json!(function));
            }
            Self::Client(_) => {
                map.insert("type".to_string(), serde_json::json!("ClientError"));
            }
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Raised at construction time when required wiring is missing.
#[derive(Debug, Clone, Error)]
#[error("Invalid configuration: '{parameter}' {message}")]
pub struct ConfigurationError {
    /// The missing or invalid parameter.
    pub parameter: String,
    /// What is wrong with it.
    pub message: String,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Creates an error for a required parameter that was not supplied.
    #[must_use]
    pub fn missing(parameter: impl Into<String>) -> Self {
        Self::new(parameter, "cannot be empty")
    }
}

/// Raised by a confirmation handler that could not take the request.
#[derive(Debug, Clone, Error)]
#[error("Confirmation handler failed for function '{function}': {reason}")]
pub struct HandlerError {
    /// The function the handler was notified about.
    pub function: String,
    /// Why the handler failed.
    pub reason: String,
}

impl HandlerError {
    /// Creates a new handler error.
    #[must_use]
    pub fn new(function: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            reason: reason.into(),
        }
    }
}
