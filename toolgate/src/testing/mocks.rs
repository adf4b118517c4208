//! Mock chat clients and tools.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::cancellation::CancellationToken;
use crate::client::{ChatClient, ChatMessage, ChatOptions, ChatResponse};
use crate::errors::GateError;
use crate::tools::{Arguments, ProposedCall, ToolCallRequest, ToolDefinition, ToolFunction};

/// A request received by a [`ScriptedChatClient`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// The conversation sent.
    pub messages: Vec<ChatMessage>,
    /// The options sent.
    pub options: ChatOptions,
}

/// A chat client replaying a fixed list of responses.
///
/// Fails with [`GateError::Client`] once the script is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedChatClient {
    script: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedChatClient {
    /// Creates a client with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a response.
    #[must_use]
    pub fn then(self, response: ChatResponse) -> Self {
        self.script.lock().push_back(response);
        self
    }

    /// Appends an assistant text response.
    #[must_use]
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.then(ChatResponse::from_message(ChatMessage::assistant(text)).with_finish_reason("stop"))
    }

    /// Appends a response requesting tool calls.
    #[must_use]
    pub fn then_tool_calls(self, calls: Vec<ToolCallRequest>) -> Self {
        self.then(
            ChatResponse::from_message(ChatMessage::assistant_tool_calls(calls))
                .with_finish_reason("tool_calls"),
        )
    }

    /// Returns the requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of scripted responses not yet served.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        _cancel: &Arc<CancellationToken>,
    ) -> Result<ChatResponse, GateError> {
        self.requests.lock().push(RecordedRequest {
            messages: messages.to_vec(),
            options: options.clone(),
        });
        self.script
            .lock()
            .pop_front()
            .ok_or_else(|| GateError::client("scripted chat client has no responses left"))
    }
}

#[derive(Debug)]
struct CountingState {
    calls: AtomicUsize,
    arguments: Mutex<Vec<Arguments>>,
}

/// A tool that records every invocation and returns a fixed value.
///
/// Clones share their counters, so a clone can be registered while the
/// original is kept for assertions.
#[derive(Debug, Clone)]
pub struct CountingTool {
    definition: ToolDefinition,
    value: serde_json::Value,
    state: Arc<CountingState>,
}

impl CountingTool {
    /// Creates a tool returning `"ok"`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            definition: ToolDefinition::new(name),
            value: serde_json::json!("ok"),
            state: Arc::new(CountingState {
                calls: AtomicUsize::new(0),
                arguments: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Sets the returned value.
    #[must_use]
    pub fn returning(mut self, value: serde_json::Value) -> Self {
        self.value = value;
        self
    }

    /// Returns how many times the tool ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Returns the arguments of every invocation.
    #[must_use]
    pub fn received_arguments(&self) -> Vec<Arguments> {
        self.state.arguments.lock().clone()
    }

    /// Builds a proposed call targeting this tool with a fresh token.
    ///
    /// Non-object `arguments` are treated as empty.
    #[must_use]
    pub fn proposed_call(&self, call_id: &str, arguments: serde_json::Value) -> ProposedCall {
        proposed_call(Arc::new(self.clone()), call_id, arguments)
    }
}

#[async_trait]
impl ToolFunction for CountingTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn invoke(
        &self,
        arguments: &Arguments,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<serde_json::Value> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.arguments.lock().push(arguments.clone());
        Ok(self.value.clone())
    }
}

/// The error returned by [`FailingTool`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SimulatedToolError {
    /// The error message.
    pub message: String,
}

/// A tool that always fails with a [`SimulatedToolError`].
#[derive(Debug, Clone)]
pub struct FailingTool {
    name: String,
    message: String,
    calls: Arc<AtomicUsize>,
}

impl FailingTool {
    /// Creates a failing tool.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns how many times the tool ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Builds a proposed call targeting this tool with a fresh token.
    #[must_use]
    pub fn proposed_call(&self, call_id: &str, arguments: serde_json::Value) -> ProposedCall {
        proposed_call(Arc::new(self.clone()), call_id, arguments)
    }
}

#[async_trait]
impl ToolFunction for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        _arguments: &Arguments,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SimulatedToolError {
            message: self.message.clone(),
        }
        .into())
    }
}

fn proposed_call(
    function: Arc<dyn ToolFunction>,
    call_id: &str,
    arguments: serde_json::Value,
) -> ProposedCall {
    let arguments = match arguments {
        serde_json::Value::Object(map) => map,
        _ => Arguments::new(),
    };
    ProposedCall::new(call_id, function, arguments, Arc::new(CancellationToken::new()))
}
