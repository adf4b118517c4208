//! Chat clients and the function-invocation hook.
//!
//! This module provides:
//! - [`ChatClient`], the narrow capability the gate needs from a model provider
//! - Chat message, option and response types
//! - [`FunctionInvoker`], the per-call invocation strategy
//! - [`FunctionInvokingClient`], the decorator running the tool-call loop

mod function_invoking;
mod invoker;
mod messages;

pub use function_invoking::{FunctionInvokingClient, MAX_ITERATIONS_FINISH_REASON};
pub use invoker::{DirectInvoker, FunctionInvoker};
pub use messages::{ChatMessage, ChatOptions, ChatResponse, ChatRole};

use crate::cancellation::CancellationToken;
use crate::errors::GateError;
use async_trait::async_trait;
use std::sync::Arc;

/// A chat/completion client.
///
/// Transport, authentication and streaming are the implementor's concern.
/// The cancellation token belongs to the whole request; tool calls proposed
/// while serving it inherit the same token.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends the conversation and returns the model's response.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        cancel: &Arc<CancellationToken>,
    ) -> Result<ChatResponse, GateError>;
}
