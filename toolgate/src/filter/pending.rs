//! Single-resolution decision slot.

use crate::tools::ProposedCall;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

struct SlotState {
    sender: Option<oneshot::Sender<bool>>,
    decision: Option<bool>,
}

struct PendingInner {
    call_id: String,
    function_name: String,
    state: Mutex<SlotState>,
}

/// A pending approve/deny decision for one proposed call.
///
/// Handles are cheap to clone and may be moved to another task (a UI loop, a
/// policy engine). The first call to [`resolve`](Self::resolve) wins; later
/// calls are no-ops and return `false`. If every handle is dropped without a
/// resolution the waiting invoker sees the decision as abandoned.
#[derive(Clone)]
pub struct PendingConfirmation {
    inner: Arc<PendingInner>,
}

impl PendingConfirmation {
    /// Creates a slot for `call` and the receiver the gate waits on.
    pub(crate) fn new(call: &ProposedCall) -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        let pending = Self {
            inner: Arc::new(PendingInner {
                call_id: call.call_id().to_string(),
                function_name: call.function_name().to_string(),
                state: Mutex::new(SlotState {
                    sender: Some(tx),
                    decision: None,
                }),
            }),
        };
        (pending, rx)
    }

    /// Resolves the decision.
    ///
    /// Returns `true` if this call resolved the slot, `false` if it had
    /// already been resolved.
    pub fn resolve(&self, approved: bool) -> bool {
        let mut state = self.inner.state.lock();
        let Some(tx) = state.sender.take() else {
            return false;
        };
        state.decision = Some(approved);
        drop(state);

        // The waiter may have gone away (cancelled or timed out); the slot is
        // still considered resolved.
        let _ = tx.send(approved);
        true
    }

    /// Approves the call.
    pub fn approve(&self) -> bool {
        self.resolve(true)
    }

    /// Denies the call.
    pub fn deny(&self) -> bool {
        self.resolve(false)
    }

    /// Returns whether a decision has been made.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.inner.state.lock().decision.is_some()
    }

    /// Returns the decision, if made.
    #[must_use]
    pub fn decision(&self) -> Option<bool> {
        self.inner.state.lock().decision
    }

    /// Returns true once the gate stopped waiting for this decision.
    #[must_use]
    pub fn is_abandoned_by_waiter(&self) -> bool {
        self.inner
            .state
            .lock()
            .sender
            .as_ref()
            .is_some_and(oneshot::Sender::is_closed)
    }

    /// Returns the call ID this decision is for.
    #[must_use]
    pub fn call_id(&self) -> &str {
        &self.inner.call_id
    }

    /// Returns the function name this decision is for.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.inner.function_name
    }
}

impl std::fmt::Debug for PendingConfirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingConfirmation")
            .field("call_id", &self.inner.call_id)
            .field("function", &self.inner.function_name)
            .field("decision", &self.decision())
            .finish()
    }
}
