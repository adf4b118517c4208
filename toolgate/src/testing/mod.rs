//! Testing utilities for code built on the gate.
//!
//! This module provides:
//! - A scripted chat client that replays canned model responses
//! - Tools that count their invocations or always fail
//! - Confirmation handlers that decide late or wait for the test to decide

mod handlers;
mod mocks;

pub use handlers::{DelayedHandler, ManualHandler};
pub use mocks::{
    CountingTool, FailingTool, RecordedRequest, ScriptedChatClient, SimulatedToolError,
};
