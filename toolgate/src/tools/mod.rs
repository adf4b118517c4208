//! Tools the model can call.
//!
//! This module provides:
//! - Tool definitions advertised to the model
//! - The [`ToolFunction`] trait and a closure-backed [`FnTool`]
//! - [`ProposedCall`], the unit the confirmation gate decides on
//! - A registry resolving raw model tool calls into proposed calls

mod call;
mod definitions;
mod function;
mod registry;

pub use call::{Arguments, InvocationResult, ProposedCall, ToolCallRequest, NOT_EXECUTED_NOTICE};
pub use definitions::ToolDefinition;
pub use function::{FnTool, ToolFunction};
pub use registry::{ToolRegistry, UnresolvedToolCall};
