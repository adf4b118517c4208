//! The invokable side of a tool.

use super::{Arguments, ToolDefinition};
use crate::cancellation::CancellationToken;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// A function the model can ask to run.
///
/// Errors are returned as [`anyhow::Error`] and travel back to the caller of
/// the turn unchanged, so implementations are free to use their own error
/// types.
#[async_trait]
pub trait ToolFunction: Send + Sync {
    /// Returns the function name.
    fn name(&self) -> &str;

    /// Returns the definition advertised to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name())
    }

    /// Runs the function.
    async fn invoke(
        &self,
        arguments: &Arguments,
        cancel: &CancellationToken,
    ) -> anyhow::Result<serde_json::Value>;
}

type BoxedHandler =
    Arc<dyn Fn(Arguments) -> BoxFuture<'static, anyhow::Result<serde_json::Value>> + Send + Sync>;

/// A tool backed by an async closure.
///
/// The closure is raced against the turn's cancellation token; if the token
/// fires first the closure's future is dropped and an error is returned. A
/// closure that is ready in the same poll as the cancellation keeps its
/// result.
#[derive(Clone)]
pub struct FnTool {
    definition: ToolDefinition,
    handler: BoxedHandler,
}

impl FnTool {
    /// Creates a tool from a definition and an async closure.
    pub fn new<F, Fut>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
    {
        Self {
            definition,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl ToolFunction for FnTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn invoke(
        &self,
        arguments: &Arguments,
        cancel: &CancellationToken,
    ) -> anyhow::Result<serde_json::Value> {
        let fut = (self.handler)(arguments.clone());
        tokio::select! {
            biased;
            result = fut => result,
            () = cancel.cancelled() => Err(anyhow::anyhow!(
                "tool '{}' cancelled: {}",
                self.definition.name,
                cancel.reason().unwrap_or_default()
            )),
        }
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn echo_tool() -> FnTool {
        FnTool::new(ToolDefinition::new("echo"), |args: Arguments| async move {
            Ok(serde_json::Value::Object(args))
        })
    }

    #[tokio::test]
    async fn test_fn_tool_invoke() {
        let tool = echo_tool();
        let mut args = Arguments::new();
        args.insert("city".to_string(), serde_json::json!("Paris"));

        let value = tool.invoke(&args, &CancellationToken::new()).await.unwrap();

        assert_eq!(tool.name(), "echo");
        assert_eq!(value["city"], "Paris");
    }

    #[tokio::test]
    async fn test_ready_result_beats_cancellation() {
        let tool = echo_tool();
        let cancel = CancellationToken::new();
        cancel.cancel("user left");

        for _ in 0..50 {
            let value = tool.invoke(&Arguments::new(), &cancel).await.unwrap();
            assert_eq!(value, serde_json::json!({}));
        }
    }

    #[tokio::test]
    async fn test_fn_tool_cancelled() {
        let tool = FnTool::new(ToolDefinition::new("slow"), |_args| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(serde_json::Value::Null)
        });
        let cancel = CancellationToken::new();
        cancel.cancel("user left");

        let err = tool.invoke(&Arguments::new(), &cancel).await.unwrap_err();
        assert!(err.to_string().contains("user left"));
    }
}
