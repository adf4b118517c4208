//! The per-call invocation strategy.

use crate::errors::GateError;
use crate::tools::{InvocationResult, ProposedCall};
use async_trait::async_trait;
use tracing::debug;

/// Runs one proposed call on behalf of a [`FunctionInvokingClient`](super::FunctionInvokingClient).
///
/// The call carries its arguments, its target and the cancellation token of
/// the enclosing request.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Invokes the call, or decides not to.
    async fn invoke(&self, call: &ProposedCall) -> Result<InvocationResult, GateError>;
}

/// Executes every call without asking anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectInvoker;

#[async_trait]
impl FunctionInvoker for DirectInvoker {
    async fn invoke(&self, call: &ProposedCall) -> Result<InvocationResult, GateError> {
        debug!(
            function = call.function_name(),
            call_id = call.call_id(),
            "Invoking function"
        );
        call.execute().await.map(InvocationResult::Completed)
    }
}
