//! Decorator-chain builder for chat clients.

use super::SessionScope;
use crate::client::{
    ChatClient, ChatOptions, DirectInvoker, FunctionInvoker, FunctionInvokingClient,
};
use crate::config::{FunctionInvocationConfig, ToolgateConfig};
use crate::errors::{ConfigurationError, GateError};
use crate::events::{EventSink, NoOpEventSink};
use crate::gate::ConfirmationGatedInvoker;
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tracing::debug;

/// Wraps a raw chat client into a [`FunctionInvokingClient`].
///
/// ```rust,ignore
/// let scope = SessionScope::new();
/// let client = ChatClientBuilder::new(raw)
///     .with_tools(registry)
///     .configure_options(|o| o.model = Some("gpt-4o".into()))
///     .use_tool_call_confirmation(&scope)
///     .build()?;
/// ```
pub struct ChatClientBuilder {
    inner: Arc<dyn ChatClient>,
    tools: Arc<ToolRegistry>,
    options: ChatOptions,
    config: FunctionInvocationConfig,
    scope: Option<SessionScope>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl ChatClientBuilder {
    /// Starts from a raw client with no tools.
    #[must_use]
    pub fn new(inner: Arc<dyn ChatClient>) -> Self {
        Self {
            inner,
            tools: Arc::new(ToolRegistry::new()),
            options: ChatOptions::default(),
            config: FunctionInvocationConfig::default(),
            scope: None,
            event_sink: None,
        }
    }

    /// Starts from a raw client with the loop settings of a validated
    /// configuration.
    ///
    /// The gate settings in `config` belong to the session; see
    /// [`SessionScope::from_config`].
    pub fn from_config(
        inner: Arc<dyn ChatClient>,
        config: &ToolgateConfig,
    ) -> Result<Self, GateError> {
        config.validate()?;
        Ok(Self::new(inner).with_invocation_config(config.invocation.clone()))
    }

    /// Attaches the tools the model may call.
    #[must_use]
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Edits the default request options.
    #[must_use]
    pub fn configure_options<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&mut ChatOptions),
    {
        configure(&mut self.options);
        self
    }

    /// Sets the tool-call loop configuration.
    #[must_use]
    pub fn with_invocation_config(mut self, config: FunctionInvocationConfig) -> Self {
        self.config = config;
        self
    }

    /// Gates every tool call on `scope`'s filter.
    #[must_use]
    pub fn use_tool_call_confirmation(mut self, scope: &SessionScope) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    /// Sets the sink receiving gate lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Builds the client.
    pub fn build(self) -> Result<FunctionInvokingClient, GateError> {
        if self.config.max_iterations == 0 {
            return Err(
                ConfigurationError::new("max_iterations", "must be at least 1").into(),
            );
        }

        let invoker: Arc<dyn FunctionInvoker> = match &self.scope {
            Some(scope) => {
                debug!(session = %scope.id(), "Building client with tool call confirmation");
                let sink = self
                    .event_sink
                    .unwrap_or_else(|| Arc::new(NoOpEventSink));
                Arc::new(
                    ConfirmationGatedInvoker::builder()
                        .scope(scope)
                        .event_sink(sink)
                        .build()?,
                )
            }
            None => Arc::new(DirectInvoker),
        };

        Ok(FunctionInvokingClient::new(self.inner, self.tools)
            .with_invoker(invoker)
            .with_default_options(self.options)
            .with_config(self.config))
    }
}

impl std::fmt::Debug for ChatClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClientBuilder")
            .field("tools", &self.tools)
            .field("options", &self.options)
            .field("config", &self.config)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
