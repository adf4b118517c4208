//! The confirmation-gated invocation strategy.
//!
//! [`ConfirmationGatedInvoker`] plugs into a
//! [`FunctionInvokingClient`](crate::client::FunctionInvokingClient) and asks
//! the session's [`ToolCallFilter`](crate::filter::ToolCallFilter) before each
//! call runs. Denied calls come back as
//! [`InvocationResult::NotExecuted`](crate::tools::InvocationResult::NotExecuted).

mod invoker;

pub use invoker::{ConfirmationGatedInvoker, ConfirmationGatedInvokerBuilder};
