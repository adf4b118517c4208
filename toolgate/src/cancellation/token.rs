//! The per-turn cancellation token.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::debug;

/// Signals that a conversation turn was abandoned.
///
/// The first reason sticks. Tasks await [`cancelled`](Self::cancelled);
/// everything else polls [`is_cancelled`](Self::is_cancelled).
#[derive(Default)]
pub struct CancellationToken {
    fired: AtomicBool,
    reason: Mutex<Option<String>>,
    wake: Notify,
}

impl CancellationToken {
    /// Creates a token that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the turn. Calls after the first are ignored.
    pub fn cancel(&self, reason: impl Into<String>) {
        {
            let mut current = self.reason.lock();
            if current.is_some() {
                return;
            }
            let reason = reason.into();
            debug!(reason = %reason, "Turn cancelled");
            *current = Some(reason);
            self.fired.store(true, Ordering::SeqCst);
        }
        self.wake.notify_waiters();
    }

    /// Resolves once the token fires.
    pub async fn cancelled(&self) {
        loop {
            let woken = self.wake.notified();
            if self.is_cancelled() {
                return;
            }
            woken.await;
        }
    }

    /// Returns true once the token fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Returns the reason given to the first [`cancel`](Self::cancel).
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("reason", &self.reason())
            .finish()
    }
}
