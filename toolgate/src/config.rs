//! Configuration types for the gate and the function-invoking client.

use crate::errors::{ConfigurationError, GateError};
use crate::observability::LogFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of a [`ToolCallFilter`](crate::filter::ToolCallFilter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Maximum time to wait for a decision, in seconds. `None` waits forever.
    #[serde(default)]
    pub decision_timeout_seconds: Option<f64>,
    /// Whether cancelling the enclosing request abandons a pending decision.
    #[serde(default = "default_cancel_pending")]
    pub cancel_pending_on_request_cancel: bool,
}

fn default_cancel_pending() -> bool {
    true
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            decision_timeout_seconds: None,
            cancel_pending_on_request_cancel: default_cancel_pending(),
        }
    }
}

impl GateConfig {
    /// Creates a gate configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the decision timeout.
    #[must_use]
    pub fn with_decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout_seconds = Some(timeout.as_secs_f64());
        self
    }

    /// Sets whether request cancellation abandons a pending decision.
    #[must_use]
    pub fn with_cancel_pending_on_request_cancel(mut self, enabled: bool) -> Self {
        self.cancel_pending_on_request_cancel = enabled;
        self
    }

    /// Returns the decision timeout as a duration.
    ///
    /// Non-positive or non-finite values are treated as no timeout.
    #[must_use]
    pub fn decision_timeout(&self) -> Option<Duration> {
        self.decision_timeout_seconds
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Configuration of a [`FunctionInvokingClient`](crate::client::FunctionInvokingClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInvocationConfig {
    /// Maximum model round-trips that may request tools within one turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Whether calls from one response are invoked concurrently.
    #[serde(default)]
    pub allow_concurrent_invocation: bool,
    /// Whether resolution errors are described to the model in detail.
    #[serde(default = "default_include_detailed_errors")]
    pub include_detailed_errors: bool,
}

fn default_max_iterations() -> usize {
    10
}

fn default_include_detailed_errors() -> bool {
    true
}

impl Default for FunctionInvocationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            allow_concurrent_invocation: false,
            include_detailed_errors: default_include_detailed_errors(),
        }
    }
}

impl FunctionInvocationConfig {
    /// Creates an invocation configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of tool round-trips.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Enables or disables concurrent invocation.
    #[must_use]
    pub fn with_concurrent_invocation(mut self, enabled: bool) -> Self {
        self.allow_concurrent_invocation = enabled;
        self
    }

    /// Enables or disables detailed resolution errors.
    #[must_use]
    pub fn with_detailed_errors(mut self, enabled: bool) -> Self {
        self.include_detailed_errors = enabled;
        self
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolgateConfig {
    /// Gate configuration applied to every new session.
    #[serde(default)]
    pub gate: GateConfig,
    /// Function invocation loop configuration.
    #[serde(default)]
    pub invocation: FunctionInvocationConfig,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl ToolgateConfig {
    /// Parses a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, GateError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::new("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the runtime cannot honor.
    pub fn validate(&self) -> Result<(), GateError> {
        if self.invocation.max_iterations == 0 {
            return Err(
                ConfigurationError::new("invocation.max_iterations", "must be at least 1").into(),
            );
        }
        if let Some(seconds) = self.gate.decision_timeout_seconds {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(ConfigurationError::new(
                    "gate.decision_timeout_seconds",
                    "must be a non-negative number",
                )
                .into());
            }
        }
        Ok(())
    }
}
