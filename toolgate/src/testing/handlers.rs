//! Confirmation handlers for tests.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::errors::HandlerError;
use crate::filter::{ConfirmationHandler, PendingConfirmation};
use crate::tools::ProposedCall;

/// Resolves every call with a fixed decision after a delay.
///
/// Must be notified from inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct DelayedHandler {
    delay: Duration,
    approve: bool,
    notified: Arc<AtomicUsize>,
}

impl DelayedHandler {
    /// Approves after `delay`.
    #[must_use]
    pub fn approve_after(delay: Duration) -> Self {
        Self::new(delay, true)
    }

    /// Denies after `delay`.
    #[must_use]
    pub fn deny_after(delay: Duration) -> Self {
        Self::new(delay, false)
    }

    fn new(delay: Duration, approve: bool) -> Self {
        Self {
            delay,
            approve,
            notified: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns how many calls the handler was notified of.
    #[must_use]
    pub fn notified_count(&self) -> usize {
        self.notified.load(Ordering::SeqCst)
    }
}

impl ConfirmationHandler for DelayedHandler {
    fn on_tool_called(
        &self,
        _call: &ProposedCall,
        pending: PendingConfirmation,
    ) -> Result<(), HandlerError> {
        self.notified.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        let approve = self.approve;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            pending.resolve(approve);
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ManualState {
    queue: Mutex<VecDeque<(ProposedCall, PendingConfirmation)>>,
    arrived: Notify,
}

/// Queues every call so the test decides when, and how, to resolve it.
#[derive(Debug, Clone, Default)]
pub struct ManualHandler {
    state: Arc<ManualState>,
}

impl ManualHandler {
    /// Creates an empty handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the next queued call.
    pub async fn next(&self) -> (ProposedCall, PendingConfirmation) {
        loop {
            let arrived = self.state.arrived.notified();
            if let Some(entry) = self.state.queue.lock().pop_front() {
                return entry;
            }
            arrived.await;
        }
    }

    /// Returns the number of calls waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.state.queue.lock().len()
    }
}

impl ConfirmationHandler for ManualHandler {
    fn on_tool_called(
        &self,
        call: &ProposedCall,
        pending: PendingConfirmation,
    ) -> Result<(), HandlerError> {
        self.state.queue.lock().push_back((call.clone(), pending));
        self.state.arrived.notify_one();
        Ok(())
    }
}
