//! Tool registry resolving model tool calls to functions.

use super::{Arguments, ProposedCall, ToolCallRequest, ToolDefinition, ToolFunction};
use crate::cancellation::CancellationToken;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A tool call that could not be turned into a [`ProposedCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedToolCall {
    /// The call ID if available.
    pub id: Option<String>,
    /// The tool name if available.
    pub name: Option<String>,
    /// The error message.
    pub error: String,
}

impl UnresolvedToolCall {
    fn new(id: Option<String>, name: Option<String>, error: impl Into<String>) -> Self {
        Self {
            id,
            name,
            error: error.into(),
        }
    }

    /// Renders the failure as the content of a tool message.
    #[must_use]
    pub fn to_message_content(&self) -> String {
        format!("Error: {}", self.error)
    }
}

/// Registry of the functions a chat client may invoke.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn ToolFunction>>>,
}

impl ToolRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&self, tool: Arc<dyn ToolFunction>) {
        let name = tool.name().to_string();
        self.tools.write().insert(name, tool);
    }

    /// Registers a tool and returns the registry, for chaining.
    #[must_use]
    pub fn with_tool(self, tool: impl ToolFunction + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    /// Gets a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolFunction>> {
        self.tools.read().get(name).cloned()
    }

    /// Checks if a tool can be executed.
    #[must_use]
    pub fn can_execute(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Lists registered tool names, sorted.
    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the definitions of all registered tools, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.read().values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Returns true if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Resolves a raw tool call into a proposed call bound to `cancellation`.
    pub fn resolve(
        &self,
        request: &ToolCallRequest,
        cancellation: &Arc<CancellationToken>,
    ) -> Result<ProposedCall, UnresolvedToolCall> {
        let id = Some(request.id.clone());
        let name = Some(request.name.clone());

        let arguments = parse_arguments(&request.arguments)
            .map_err(|error| UnresolvedToolCall::new(id.clone(), name.clone(), error))?;

        let Some(function) = self.get(&request.name) else {
            return Err(UnresolvedToolCall::new(
                id,
                name,
                format!("No tool registered with name '{}'", request.name),
            ));
        };

        Ok(ProposedCall::new(
            request.id.clone(),
            function,
            arguments,
            cancellation.clone(),
        ))
    }

    /// Parses OpenAI-style tool calls (`{"id", "function": {"name", "arguments"}}`).
    pub fn parse_openai_calls(
        calls: &[serde_json::Value],
    ) -> Vec<Result<ToolCallRequest, UnresolvedToolCall>> {
        calls.iter().map(parse_openai_call).collect()
    }

    /// Clears all registered tools.
    pub fn clear(&self) {
        self.tools.write().clear();
    }
}

fn parse_arguments(raw: &str) -> Result<Arguments, String> {
    if raw.trim().is_empty() {
        return Ok(Arguments::new());
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(serde_json::Value::Null) => Ok(Arguments::new()),
        Ok(_) => Err("Arguments must be a JSON object".to_string()),
        Err(e) => Err(format!("Invalid JSON in arguments: {e}")),
    }
}

fn parse_openai_call(call: &serde_json::Value) -> Result<ToolCallRequest, UnresolvedToolCall> {
    let id = call.get("id").and_then(|v| v.as_str()).map(String::from);

    let Some(func_obj) = call.get("function") else {
        return Err(UnresolvedToolCall::new(id, None, "Missing function wrapper"));
    };

    let Some(name) = func_obj.get("name").and_then(|v| v.as_str()).map(String::from) else {
        return Err(UnresolvedToolCall::new(id, None, "Missing tool name"));
    };

    let arguments = match func_obj.get("arguments") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(obj @ serde_json::Value::Object(_)) => obj.to_string(),
        _ => String::new(),
    };

    Ok(ToolCallRequest {
        id: id.unwrap_or_default(),
        name,
        arguments,
    })
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_tools())
            .finish()
    }
}
