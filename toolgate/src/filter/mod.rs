//! The confirmation gate between a proposed call and its execution.
//!
//! A [`ToolCallFilter`] holds zero or more [`ConfirmationHandler`]s. With no
//! handler attached every call is approved on the spot. Otherwise each call
//! gets a fresh [`PendingConfirmation`] that is handed to every handler, and
//! the caller waits until one of them resolves it.
//!
//! ```rust,ignore
//! let filter = ToolCallFilter::new();
//! filter.subscribe_fn(|call, pending| {
//!     pending.resolve(call.function_name() != "delete_everything");
//!     Ok(())
//! });
//! let approved = filter.request_decision(&call).await?;
//! ```

mod handler;
mod pending;
mod tool_call_filter;

pub use handler::{
    confirmation_channel, ChannelHandler, ConfirmationHandler, ConfirmationRequest, PolicyHandler,
};
pub use pending::PendingConfirmation;
pub use tool_call_filter::{DecisionWait, SubscriptionId, ToolCallFilter};
