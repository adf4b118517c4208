//! Chat client decorator that runs the tool-call loop.

use super::{ChatClient, ChatMessage, ChatOptions, ChatResponse, DirectInvoker, FunctionInvoker};
use crate::cancellation::CancellationToken;
use crate::config::FunctionInvocationConfig;
use crate::errors::GateError;
use crate::tools::{ToolCallRequest, ToolRegistry};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Finish reason reported when the loop stopped at the iteration limit.
pub const MAX_ITERATIONS_FINISH_REASON: &str = "max_iterations";

/// Wraps a [`ChatClient`] and executes the tool calls the model asks for.
///
/// Every requested call is resolved against the [`ToolRegistry`] and handed to
/// the configured [`FunctionInvoker`]; results go back to the model as tool
/// messages until it answers without requesting tools.
pub struct FunctionInvokingClient {
    inner: Arc<dyn ChatClient>,
    tools: Arc<ToolRegistry>,
    invoker: Arc<dyn FunctionInvoker>,
    default_options: ChatOptions,
    config: FunctionInvocationConfig,
}

impl FunctionInvokingClient {
    /// Creates a client that invokes tools directly.
    #[must_use]
    pub fn new(inner: Arc<dyn ChatClient>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            inner,
            tools,
            invoker: Arc::new(DirectInvoker),
            default_options: ChatOptions::default(),
            config: FunctionInvocationConfig::default(),
        }
    }

    /// Replaces the invocation strategy.
    #[must_use]
    pub fn with_invoker(mut self, invoker: Arc<dyn FunctionInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    /// Sets options applied when a request leaves them unset.
    #[must_use]
    pub fn with_default_options(mut self, options: ChatOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Sets the loop configuration.
    #[must_use]
    pub fn with_config(mut self, config: FunctionInvocationConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the invocation strategy.
    #[must_use]
    pub fn invoker(&self) -> &Arc<dyn FunctionInvoker> {
        &self.invoker
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Returns the loop configuration.
    #[must_use]
    pub fn config(&self) -> &FunctionInvocationConfig {
        &self.config
    }

    fn effective_options(&self, options: &ChatOptions) -> ChatOptions {
        let mut effective = options.clone();
        if effective.model.is_none() {
            effective.model.clone_from(&self.default_options.model);
        }
        if effective.temperature.is_none() {
            effective.temperature = self.default_options.temperature;
        }
        if effective.max_tokens.is_none() {
            effective.max_tokens = self.default_options.max_tokens;
        }
        effective.merge_tools(self.default_options.tools.iter().cloned());
        effective.merge_tools(self.tools.definitions());
        effective
    }

    async fn invoke_one(
        &self,
        request: &ToolCallRequest,
        cancel: &Arc<CancellationToken>,
    ) -> Result<ChatMessage, GateError> {
        let call = match self.tools.resolve(request, cancel) {
            Ok(call) => call,
            Err(unresolved) => {
                warn!(
                    function = %request.name,
                    call_id = %request.id,
                    error = %unresolved.error,
                    "Could not resolve tool call"
                );
                let content = if self.config.include_detailed_errors {
                    unresolved.to_message_content()
                } else {
                    "Error: the requested function call could not be processed.".to_string()
                };
                return Ok(ChatMessage::tool(request.id.clone(), content));
            }
        };

        let result = self.invoker.invoke(&call).await?;
        Ok(ChatMessage::tool(
            call.call_id().to_string(),
            result.to_message_content(),
        ))
    }

    async fn invoke_all(
        &self,
        requests: &[ToolCallRequest],
        cancel: &Arc<CancellationToken>,
    ) -> Result<Vec<ChatMessage>, GateError> {
        if self.config.allow_concurrent_invocation && requests.len() > 1 {
            return try_join_all(requests.iter().map(|r| self.invoke_one(r, cancel))).await;
        }

        let mut messages = Vec::with_capacity(requests.len());
        for request in requests {
            messages.push(self.invoke_one(request, cancel).await?);
        }
        Ok(messages)
    }
}

#[async_trait]
impl ChatClient for FunctionInvokingClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        cancel: &Arc<CancellationToken>,
    ) -> Result<ChatResponse, GateError> {
        let mut options = self.effective_options(options);
        let mut conversation = messages.to_vec();
        let mut added: Vec<ChatMessage> = Vec::new();

        for iteration in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                return Err(GateError::cancelled(cancel.reason().unwrap_or_default()));
            }

            let response = self.inner.complete(&conversation, &options, cancel).await?;
            let requests: Vec<ToolCallRequest> = response.tool_calls().cloned().collect();

            conversation.extend(response.messages.iter().cloned());
            added.extend(response.messages.iter().cloned());

            if requests.is_empty() {
                debug!(iteration, "Model answered without tool calls");
                return Ok(ChatResponse {
                    messages: added,
                    model: response.model,
                    finish_reason: response.finish_reason,
                });
            }

            debug!(iteration, count = requests.len(), "Model requested tool calls");
            let tool_messages = self.invoke_all(&requests, cancel).await?;
            conversation.extend(tool_messages.iter().cloned());
            added.extend(tool_messages);
        }

        info!(
            max_iterations = self.config.max_iterations,
            "Tool call iteration limit reached, requesting a final answer without tools"
        );
        if cancel.is_cancelled() {
            return Err(GateError::cancelled(cancel.reason().unwrap_or_default()));
        }

        options.tools.clear();
        let response = self.inner.complete(&conversation, &options, cancel).await?;
        added.extend(
            response
                .messages
                .into_iter()
                .filter(|m| m.tool_calls.is_empty() || !m.content.is_empty())
                .map(|mut m| {
                    m.tool_calls.clear();
                    m
                }),
        );

        Ok(ChatResponse {
            messages: added,
            model: response.model,
            finish_reason: Some(MAX_ITERATIONS_FINISH_REASON.to_string()),
        })
    }
}

impl std::fmt::Debug for FunctionInvokingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionInvokingClient")
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatRole;
    use crate::testing::{CountingTool, FailingTool, ScriptedChatClient};
    use crate::tools::NOT_EXECUTED_NOTICE;
    use pretty_assertions::assert_eq;

    fn weather_turn() -> ScriptedChatClient {
        ScriptedChatClient::new()
            .then_tool_calls(vec![ToolCallRequest::new(
                "call_1",
                "get_weather",
                r#"{"city": "Paris"}"#,
            )])
            .then_text("It is sunny in Paris.")
    }

    fn token() -> Arc<CancellationToken> {
        Arc::new(CancellationToken::new())
    }

    #[tokio::test]
    async fn test_tool_loop_runs_tool_and_returns_answer() {
        let tool = CountingTool::new("get_weather").returning(serde_json::json!({"sky": "clear"}));
        let inner = Arc::new(weather_turn());
        let client = FunctionInvokingClient::new(
            inner.clone(),
            Arc::new(ToolRegistry::new().with_tool(tool.clone())),
        );

        let response = client
            .complete(&[ChatMessage::user("Weather?")], &ChatOptions::new(), &token())
            .await
            .unwrap();

        assert_eq!(response.text(), "It is sunny in Paris.");
        assert_eq!(response.messages.len(), 3);
        assert_eq!(response.messages[1], ChatMessage::tool("call_1", r#"{"sky":"clear"}"#));
        assert_eq!(tool.call_count(), 1);

        let requests = inner.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].options.tools[0].name, "get_weather");
        assert_eq!(requests[1].messages.last().unwrap().role, ChatRole::Tool);
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_to_model() {
        let inner = Arc::new(
            ScriptedChatClient::new()
                .then_tool_calls(vec![ToolCallRequest::new("call_9", "launch_rocket", "{}")])
                .then_text("Sorry."),
        );
        let client = FunctionInvokingClient::new(inner, Arc::new(ToolRegistry::new()));

        let response = client
            .complete(&[ChatMessage::user("Go")], &ChatOptions::new(), &token())
            .await
            .unwrap();

        assert!(response.messages[1].content.contains("No tool registered"));
        assert_eq!(response.text(), "Sorry.");
    }

    #[tokio::test]
    async fn test_generic_resolution_error_when_details_disabled() {
        let inner = Arc::new(
            ScriptedChatClient::new()
                .then_tool_calls(vec![ToolCallRequest::new("call_9", "launch_rocket", "{}")])
                .then_text("Sorry."),
        );
        let client = FunctionInvokingClient::new(inner, Arc::new(ToolRegistry::new()))
            .with_config(FunctionInvocationConfig::new().with_detailed_errors(false));

        let response = client
            .complete(&[ChatMessage::user("Go")], &ChatOptions::new(), &token())
            .await
            .unwrap();

        assert!(!response.messages[1].content.contains("launch_rocket"));
    }

    #[tokio::test]
    async fn test_execution_error_aborts_turn() {
        let inner = Arc::new(weather_turn());
        let client = FunctionInvokingClient::new(
            inner.clone(),
            Arc::new(ToolRegistry::new().with_tool(FailingTool::new("get_weather", "quota exceeded"))),
        );

        let err = client
            .complete(&[ChatMessage::user("Weather?")], &ChatOptions::new(), &token())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "quota exceeded");
        assert_eq!(inner.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_iteration_limit_forces_final_answer() {
        let looping = ToolCallRequest::new("call_1", "get_weather", "{}");
        let inner = Arc::new(
            ScriptedChatClient::new()
                .then_tool_calls(vec![looping.clone()])
                .then_tool_calls(vec![looping])
                .then_text("Giving up."),
        );
        let tool = CountingTool::new("get_weather");
        let client = FunctionInvokingClient::new(
            inner.clone(),
            Arc::new(ToolRegistry::new().with_tool(tool.clone())),
        )
        .with_config(FunctionInvocationConfig::new().with_max_iterations(2));

        let response = client
            .complete(&[ChatMessage::user("Weather?")], &ChatOptions::new(), &token())
            .await
            .unwrap();

        assert_eq!(tool.call_count(), 2);
        assert_eq!(response.finish_reason.as_deref(), Some(MAX_ITERATIONS_FINISH_REASON));
        assert_eq!(response.text(), "Giving up.");
        assert!(inner.requests()[2].options.tools.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_invocation_keeps_response_order() {
        let inner = Arc::new(
            ScriptedChatClient::new()
                .then_tool_calls(vec![
                    ToolCallRequest::new("a", "get_weather", r#"{"city": "Paris"}"#),
                    ToolCallRequest::new("b", "get_weather", r#"{"city": "Oslo"}"#),
                ])
                .then_text("Done."),
        );
        let tool = CountingTool::new("get_weather");
        let client = FunctionInvokingClient::new(
            inner,
            Arc::new(ToolRegistry::new().with_tool(tool.clone())),
        )
        .with_config(FunctionInvocationConfig::new().with_concurrent_invocation(true));

        let response = client
            .complete(&[ChatMessage::user("Both?")], &ChatOptions::new(), &token())
            .await
            .unwrap();

        let ids: Vec<Option<&str>> = response.messages[1..3]
            .iter()
            .map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(ids, vec![Some("a"), Some("b")]);
        assert_eq!(tool.call_count(), 2);
    }

    #[tokio::test]
    async fn test_denied_call_reported_as_not_executed() {
        struct DenyAll;

        #[async_trait]
        impl FunctionInvoker for DenyAll {
            async fn invoke(
                &self,
                _call: &crate::tools::ProposedCall,
            ) -> Result<crate::tools::InvocationResult, GateError> {
                Ok(crate::tools::InvocationResult::NotExecuted)
            }
        }

        let tool = CountingTool::new("get_weather");
        let client = FunctionInvokingClient::new(
            Arc::new(weather_turn()),
            Arc::new(ToolRegistry::new().with_tool(tool.clone())),
        )
        .with_invoker(Arc::new(DenyAll));

        let response = client
            .complete(&[ChatMessage::user("Weather?")], &ChatOptions::new(), &token())
            .await
            .unwrap();

        assert_eq!(response.messages[1].content, NOT_EXECUTED_NOTICE);
        assert_eq!(tool.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_request_fails_fast() {
        let inner = Arc::new(weather_turn());
        let client = FunctionInvokingClient::new(inner.clone(), Arc::new(ToolRegistry::new()));
        let cancel = token();
        cancel.cancel("shutdown");

        let err = client
            .complete(&[ChatMessage::user("Weather?")], &ChatOptions::new(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Cancelled(_)));
        assert!(inner.requests().is_empty());
    }

    #[tokio::test]
    async fn test_default_options_applied() {
        let inner = Arc::new(ScriptedChatClient::new().then_text("hi"));
        let client = FunctionInvokingClient::new(inner.clone(), Arc::new(ToolRegistry::new()))
            .with_default_options(ChatOptions::new().with_model("gpt-4o-mini"));

        client
            .complete(&[ChatMessage::user("hello")], &ChatOptions::new(), &token())
            .await
            .unwrap();

        assert_eq!(inner.requests()[0].options.model.as_deref(), Some("gpt-4o-mini"));
    }
}
