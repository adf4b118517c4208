//! The invoker that asks before it runs.

use crate::client::FunctionInvoker;
use crate::errors::{ConfigurationError, GateError};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::filter::ToolCallFilter;
use crate::observability::{InvocationSpanAttributes, SpanTimer};
use crate::tools::{InvocationResult, ProposedCall};
use crate::wiring::SessionScope;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument, Span};

/// Consults the session's filter and executes only approved calls.
///
/// Execution errors pass through unchanged; a denial is a successful
/// [`InvocationResult::NotExecuted`].
pub struct ConfirmationGatedInvoker {
    scope: SessionScope,
    event_sink: Arc<dyn EventSink>,
}

impl ConfirmationGatedInvoker {
    /// Creates an invoker gated by `scope`'s filter.
    #[must_use]
    pub fn new(scope: &SessionScope) -> Self {
        Self {
            scope: scope.clone(),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder() -> ConfirmationGatedInvokerBuilder {
        ConfirmationGatedInvokerBuilder::default()
    }

    /// Returns the filter consulted for every call.
    #[must_use]
    pub fn filter(&self) -> &Arc<ToolCallFilter> {
        self.scope.filter()
    }

    /// Returns the session scope.
    #[must_use]
    pub fn scope(&self) -> &SessionScope {
        &self.scope
    }

    fn attributes(&self, call: &ProposedCall) -> InvocationSpanAttributes {
        InvocationSpanAttributes::new(call.function_name(), call.call_id())
            .with_session_id(self.scope.id().to_string())
    }

    async fn fail(&self, attrs: InvocationSpanAttributes, error: &GateError) {
        let attrs = attrs.with_error(error.to_string());
        self.event_sink
            .emit(event_types::TOOL_FAILED, Some(attrs.to_event_data()))
            .await;
    }
}

impl std::fmt::Debug for ConfirmationGatedInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationGatedInvoker")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FunctionInvoker for ConfirmationGatedInvoker {
    async fn invoke(&self, call: &ProposedCall) -> Result<InvocationResult, GateError> {
        let attrs = self.attributes(call);
        let span = attrs.span();
        self.gate(call, attrs).instrument(span).await
    }
}

impl ConfirmationGatedInvoker {
    async fn gate(
        &self,
        call: &ProposedCall,
        attrs: InvocationSpanAttributes,
    ) -> Result<InvocationResult, GateError> {
        self.event_sink
            .emit(event_types::TOOL_INVOKED, Some(attrs.to_event_data()))
            .await;

        let decision = match self.scope.filter().notify(call) {
            Ok(Some(wait)) => {
                self.event_sink
                    .emit(event_types::APPROVAL_REQUESTED, Some(attrs.to_event_data()))
                    .await;
                wait.decision().await
            }
            Ok(None) => Ok(true),
            Err(e) => Err(e),
        };

        let approved = match decision {
            Ok(approved) => approved,
            Err(e) => {
                warn!(
                    function = call.function_name(),
                    call_id = call.call_id(),
                    error = %e,
                    "No confirmation decision"
                );
                self.fail(attrs, &e).await;
                return Err(e);
            }
        };

        Span::current().record("approved", approved);
        let attrs = attrs.with_approved(approved);
        self.event_sink
            .emit(event_types::APPROVAL_DECIDED, Some(attrs.to_event_data()))
            .await;

        if !approved {
            info!(
                function = call.function_name(),
                call_id = call.call_id(),
                approved,
                "Tool call denied, not executing"
            );
            self.event_sink
                .emit(event_types::TOOL_NOT_EXECUTED, Some(attrs.to_event_data()))
                .await;
            return Ok(InvocationResult::NotExecuted);
        }

        debug!(
            function = call.function_name(),
            call_id = call.call_id(),
            approved,
            "Tool call approved, executing"
        );
        self.event_sink
            .emit(event_types::TOOL_STARTED, Some(attrs.to_event_data()))
            .await;

        let timer = SpanTimer::start(call.function_name());
        match call.execute().await {
            Ok(value) => {
                let attrs = attrs.with_duration_ms(timer.elapsed_ms());
                self.event_sink
                    .emit(event_types::TOOL_COMPLETED, Some(attrs.to_event_data()))
                    .await;
                Ok(InvocationResult::Completed(value))
            }
            Err(e) => {
                let attrs = attrs.with_duration_ms(timer.elapsed_ms());
                self.fail(attrs, &e).await;
                Err(e)
            }
        }
    }
}

/// Builds a [`ConfirmationGatedInvoker`].
#[derive(Default)]
pub struct ConfirmationGatedInvokerBuilder {
    scope: Option<SessionScope>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl ConfirmationGatedInvokerBuilder {
    /// Sets the session scope providing the filter. Required.
    #[must_use]
    pub fn scope(mut self, scope: &SessionScope) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    /// Sets the lifecycle event sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Builds the invoker.
    ///
    /// Fails with [`GateError::Configuration`] when no scope was set.
    pub fn build(self) -> Result<ConfirmationGatedInvoker, GateError> {
        let scope = self
            .scope
            .ok_or_else(|| ConfigurationError::missing("session_scope"))?;
        Ok(ConfirmationGatedInvoker {
            scope,
            event_sink: self.event_sink.unwrap_or_else(|| Arc::new(NoOpEventSink)),
        })
    }
}

impl std::fmt::Debug for ConfirmationGatedInvokerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationGatedInvokerBuilder")
            .field("scope", &self.scope)
            .field("has_event_sink", &self.event_sink.is_some())
            .finish()
    }
}
