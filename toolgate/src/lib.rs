//! # Toolgate
//!
//! Human-in-the-loop confirmation for LLM tool calls.
//!
//! When a model asks to run a function, toolgate intercepts the call and
//! lets subscribed handlers approve or deny it before anything executes:
//!
//! - **Tool call filter**: a per-session set of confirmation handlers
//! - **Pending confirmations**: single-resolution decision slots handed to handlers
//! - **Gated invocation**: approved calls run, denied calls come back as "not executed"
//! - **Function-invoking client**: the tool-call loop around any chat client
//! - **Session wiring**: explicit per-session scopes instead of global state
//!
//! With no handler attached, every call is approved.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use toolgate::prelude::*;
//!
//! let scope = SessionScope::new();
//! let client = ChatClientBuilder::new(raw_client)
//!     .with_tools(Arc::new(registry))
//!     .use_tool_call_confirmation(&scope)
//!     .build()?;
//!
//! // Ask the user before running anything.
//! let (handler, mut requests) = confirmation_channel(16);
//! scope.filter().subscribe(handler);
//! tokio::spawn(async move {
//!     while let Some(request) = requests.recv().await {
//!         request.approve();
//!     }
//! });
//!
//! let response = client.complete(&messages, &ChatOptions::new(), &cancel).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod filter;
pub mod gate;
pub mod observability;
pub mod testing;
pub mod tools;
pub mod wiring;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::client::{
        ChatClient, ChatMessage, ChatOptions, ChatResponse, ChatRole, DirectInvoker,
        FunctionInvoker, FunctionInvokingClient,
    };
    pub use crate::config::{FunctionInvocationConfig, GateConfig, ToolgateConfig};
    pub use crate::errors::{ConfigurationError, GateError, HandlerError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::filter::{
        confirmation_channel, ChannelHandler, ConfirmationHandler, ConfirmationRequest,
        PendingConfirmation, PolicyHandler, SubscriptionId, ToolCallFilter,
    };
    pub use crate::gate::ConfirmationGatedInvoker;
    pub use crate::tools::{
        Arguments, FnTool, InvocationResult, ProposedCall, ToolCallRequest, ToolDefinition,
        ToolFunction, ToolRegistry,
    };
    pub use crate::wiring::{ChatClientBuilder, SessionScope};
}
