//! Confirmation handlers.

use super::PendingConfirmation;
use crate::errors::HandlerError;
use crate::tools::ProposedCall;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Receives every proposed call seen by a [`ToolCallFilter`](super::ToolCallFilter).
///
/// Handlers are notified synchronously and must not block. The only
/// obligation is to eventually resolve `pending`, either right away or from
/// another task that was handed the (cloneable) slot.
pub trait ConfirmationHandler: Send + Sync {
    /// Called once per proposed call.
    fn on_tool_called(
        &self,
        call: &ProposedCall,
        pending: PendingConfirmation,
    ) -> Result<(), HandlerError>;
}

impl<F> ConfirmationHandler for F
where
    F: Fn(&ProposedCall, PendingConfirmation) -> Result<(), HandlerError> + Send + Sync,
{
    fn on_tool_called(
        &self,
        call: &ProposedCall,
        pending: PendingConfirmation,
    ) -> Result<(), HandlerError> {
        self(call, pending)
    }
}

/// A confirmation request delivered to a UI loop.
#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
    /// The call awaiting a decision.
    pub call: ProposedCall,
    /// The slot to resolve.
    pub pending: PendingConfirmation,
}

impl ConfirmationRequest {
    /// Approves the call.
    pub fn approve(&self) -> bool {
        self.pending.approve()
    }

    /// Denies the call.
    pub fn deny(&self) -> bool {
        self.pending.deny()
    }
}

/// Forwards confirmation requests over a bounded channel.
///
/// Created with [`confirmation_channel`]; the receiver half belongs to
/// whatever renders the prompt.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    request_tx: mpsc::Sender<ConfirmationRequest>,
}

impl ConfirmationHandler for ChannelHandler {
    fn on_tool_called(
        &self,
        call: &ProposedCall,
        pending: PendingConfirmation,
    ) -> Result<(), HandlerError> {
        let request = ConfirmationRequest {
            call: call.clone(),
            pending,
        };
        self.request_tx.try_send(request).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "confirmation queue is full",
                TrySendError::Closed(_) => "confirmation receiver was dropped",
            };
            HandlerError::new(call.function_name(), reason)
        })
    }
}

/// Creates a confirmation channel pair.
///
/// Returns the handler (to subscribe on a filter) and the receiver (for the UI).
pub fn confirmation_channel(
    capacity: usize,
) -> (ChannelHandler, mpsc::Receiver<ConfirmationRequest>) {
    let (request_tx, request_rx) = mpsc::channel(capacity);
    (ChannelHandler { request_tx }, request_rx)
}

type Policy = Arc<dyn Fn(&ProposedCall) -> bool + Send + Sync>;

/// Resolves every call immediately from a predicate.
#[derive(Clone)]
pub struct PolicyHandler {
    policy: Policy,
}

impl PolicyHandler {
    /// Creates a handler approving calls for which `policy` returns true.
    pub fn new<F>(policy: F) -> Self
    where
        F: Fn(&ProposedCall) -> bool + Send + Sync + 'static,
    {
        Self {
            policy: Arc::new(policy),
        }
    }

    /// Approves only the named functions.
    pub fn allow_list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: HashSet<String> = names.into_iter().map(Into::into).collect();
        Self::new(move |call| allowed.contains(call.function_name()))
    }

    /// Denies the named functions and approves everything else.
    pub fn deny_list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let denied: HashSet<String> = names.into_iter().map(Into::into).collect();
        Self::new(move |call| !denied.contains(call.function_name()))
    }
}

impl ConfirmationHandler for PolicyHandler {
    fn on_tool_called(
        &self,
        call: &ProposedCall,
        pending: PendingConfirmation,
    ) -> Result<(), HandlerError> {
        pending.resolve((self.policy)(call));
        Ok(())
    }
}

impl std::fmt::Debug for PolicyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyHandler").finish_non_exhaustive()
    }
}
