//! The subscribable tool call filter.

use super::{ConfirmationHandler, PendingConfirmation};
use crate::config::GateConfig;
use crate::errors::{GateError, HandlerError};
use crate::tools::ProposedCall;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifies a handler registered on a [`ToolCallFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Decides, per proposed call, whether execution may proceed.
///
/// One filter belongs to one session. It keeps no per-call state: every call
/// gets a fresh [`PendingConfirmation`].
#[derive(Default)]
pub struct ToolCallFilter {
    handlers: RwLock<Vec<(SubscriptionId, Arc<dyn ConfirmationHandler>)>>,
    config: GateConfig,
}

impl ToolCallFilter {
    /// Creates a filter with no handlers and the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter with the given configuration.
    #[must_use]
    pub fn with_config(config: GateConfig) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Registers a handler notified of every proposed call.
    pub fn subscribe<H>(&self, handler: H) -> SubscriptionId
    where
        H: ConfirmationHandler + 'static,
    {
        self.subscribe_arc(Arc::new(handler))
    }

    /// Registers a shared handler.
    pub fn subscribe_arc(&self, handler: Arc<dyn ConfirmationHandler>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.handlers.write().push((id, handler));
        debug!(subscription = %id, "Confirmation handler subscribed");
        id
    }

    /// Registers a closure handler.
    pub fn subscribe_fn<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ProposedCall, PendingConfirmation) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.subscribe(handler)
    }

    /// Removes a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        let removed = handlers.len() != before;
        if removed {
            debug!(subscription = %id, "Confirmation handler unsubscribed");
        }
        removed
    }

    /// Returns true if at least one handler is attached.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        !self.handlers.read().is_empty()
    }

    /// Returns the number of attached handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Resolves the approve/deny decision for `call`.
    ///
    /// With no handler attached this approves without suspending. Otherwise
    /// every handler is notified in subscription order and the caller waits
    /// for the first resolution. A handler error stops notification and is
    /// returned as [`GateError::Handler`].
    pub async fn request_decision(&self, call: &ProposedCall) -> Result<bool, GateError> {
        match self.notify(call)? {
            Some(wait) => wait.decision().await,
            None => Ok(true),
        }
    }

    /// Notifies the handlers of `call` without waiting for the outcome.
    ///
    /// Returns `None` when no handler is attached, meaning the call is
    /// approved. Otherwise every handler in the current snapshot has been
    /// handed the slot and the returned [`DecisionWait`] yields the decision.
    pub fn notify<'a>(
        &'a self,
        call: &'a ProposedCall,
    ) -> Result<Option<DecisionWait<'a>>, GateError> {
        // Snapshot so handlers may (un)subscribe while being notified.
        let handlers: Vec<Arc<dyn ConfirmationHandler>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();

        if handlers.is_empty() {
            debug!(
                function = call.function_name(),
                call_id = call.call_id(),
                "No confirmation handlers attached, approving"
            );
            return Ok(None);
        }

        if self.config.cancel_pending_on_request_cancel && call.cancellation().is_cancelled() {
            return Err(cancelled_error(call));
        }

        let (pending, decision_rx) = PendingConfirmation::new(call);
        for handler in &handlers {
            if let Err(e) = handler.on_tool_called(call, pending.clone()) {
                warn!(
                    function = call.function_name(),
                    call_id = call.call_id(),
                    error = %e,
                    "Confirmation handler failed"
                );
                return Err(e.into());
            }
        }

        Ok(Some(DecisionWait {
            call,
            config: &self.config,
            notified: handlers.len(),
            decision_rx,
        }))
    }
}

/// A decision that handlers were asked for and have not necessarily made.
///
/// Holds no [`PendingConfirmation`] itself, so once every handler drops its
/// handle unresolved the wait ends with [`GateError::DecisionAbandoned`].
pub struct DecisionWait<'a> {
    call: &'a ProposedCall,
    config: &'a GateConfig,
    notified: usize,
    decision_rx: oneshot::Receiver<bool>,
}

impl DecisionWait<'_> {
    /// Returns how many handlers were notified.
    #[must_use]
    pub fn notified(&self) -> usize {
        self.notified
    }

    /// Waits for the decision.
    ///
    /// When cancellation is linked to the wait and the token has fired, the
    /// result is [`GateError::Cancelled`] even if the slot was resolved or
    /// abandoned in the same instant.
    pub async fn decision(self) -> Result<bool, GateError> {
        let Self {
            call,
            config,
            decision_rx,
            ..
        } = self;
        let function = call.function_name();

        let wait = async {
            decision_rx.await.map_err(|_| GateError::DecisionAbandoned {
                function: function.to_string(),
            })
        };

        let bounded = async {
            match config.decision_timeout() {
                Some(timeout) => match tokio::time::timeout(timeout, wait).await {
                    Ok(decision) => decision,
                    Err(_) => Err(GateError::DecisionTimeout {
                        function: function.to_string(),
                        timeout,
                    }),
                },
                None => wait.await,
            }
        };

        if !config.cancel_pending_on_request_cancel {
            return bounded.await;
        }

        let cancel = call.cancellation();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(cancelled_error(call)),
            decision = bounded => decision,
        }
    }
}

impl std::fmt::Debug for DecisionWait<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionWait")
            .field("call", self.call)
            .field("notified", &self.notified)
            .finish_non_exhaustive()
    }
}

fn cancelled_error(call: &ProposedCall) -> GateError {
    let reason = call
        .cancellation()
        .reason()
        .unwrap_or_else(|| "request cancelled".to_string());
    GateError::cancelled(format!(
        "confirmation of '{}' abandoned: {reason}",
        call.function_name()
    ))
}

impl std::fmt::Debug for ToolCallFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallFilter")
            .field("subscriber_count", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PolicyHandler;
    use crate::testing::CountingTool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready};

    fn call() -> ProposedCall {
        CountingTool::new("get_weather").proposed_call("call_1", serde_json::json!({"city": "Paris"}))
    }

    #[test]
    fn test_no_subscribers_approves_without_suspending() {
        let filter = ToolCallFilter::new();
        let call = call();

        let mut task = tokio_test::task::spawn(filter.request_decision(&call));
        let decision = assert_ready!(task.poll());
        assert!(decision.unwrap());
    }

    #[tokio::test]
    async fn test_single_handler_decides() {
        let filter = ToolCallFilter::new();
        filter.subscribe_fn(|_call, pending| {
            pending.deny();
            Ok(())
        });

        assert!(!filter.request_decision(&call()).await.unwrap());
    }

    #[tokio::test]
    async fn test_all_handlers_notified_first_resolution_wins() {
        let filter = ToolCallFilter::new();
        let notified = Arc::new(AtomicUsize::new(0));

        for approve in [false, true] {
            let notified = notified.clone();
            filter.subscribe_fn(move |_call, pending| {
                notified.fetch_add(1, Ordering::SeqCst);
                pending.resolve(approve);
                Ok(())
            });
        }

        assert!(!filter.request_decision(&call()).await.unwrap());
        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_restores_fail_open() {
        let filter = ToolCallFilter::new();
        let id = filter.subscribe(PolicyHandler::new(|_| false));
        assert!(filter.has_subscribers());

        assert!(filter.unsubscribe(id));
        assert!(!filter.unsubscribe(id));
        assert_eq!(filter.subscriber_count(), 0);

        assert!(filter.request_decision(&call()).await.unwrap());
    }

    #[tokio::test]
    async fn test_handler_error_propagates() {
        let filter = ToolCallFilter::new();
        filter.subscribe_fn(|call, _pending| {
            Err(HandlerError::new(call.function_name(), "prompt unavailable"))
        });

        let err = filter.request_decision(&call()).await.unwrap_err();
        assert!(matches!(err, GateError::Handler(_)));
    }

    #[tokio::test]
    async fn test_dropped_slot_is_abandoned() {
        let filter = ToolCallFilter::new();
        filter.subscribe_fn(|_call, _pending| Ok(()));

        let err = filter.request_decision(&call()).await.unwrap_err();
        assert!(matches!(err, GateError::DecisionAbandoned { .. }));
    }

    #[test]
    fn test_waits_until_resolved() {
        let filter = ToolCallFilter::new();
        let slot: Arc<parking_lot::Mutex<Option<PendingConfirmation>>> = Arc::default();
        {
            let slot = slot.clone();
            filter.subscribe_fn(move |_call, pending| {
                *slot.lock() = Some(pending);
                Ok(())
            });
        }

        let call = call();
        let mut task = tokio_test::task::spawn(filter.request_decision(&call));
        assert_pending!(task.poll());
        assert_pending!(task.poll());

        slot.lock().take().unwrap().approve();
        assert!(task.is_woken());
        let decision = assert_ready!(task.poll());
        assert!(decision.unwrap());
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_pending_wait() {
        let filter = ToolCallFilter::new();
        let keep: Arc<parking_lot::Mutex<Vec<PendingConfirmation>>> = Arc::default();
        {
            let keep = keep.clone();
            filter.subscribe_fn(move |_call, pending| {
                keep.lock().push(pending);
                Ok(())
            });
        }

        let call = call();
        let token = call.cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel("user closed the chat");
        });

        let err = filter.request_decision(&call).await.unwrap_err();
        assert!(err.to_string().contains("user closed the chat"));
        assert!(keep.lock()[0].is_abandoned_by_waiter());
    }

    #[tokio::test]
    async fn test_cancellation_ignored_when_disabled() {
        let config = GateConfig::default()
            .with_cancel_pending_on_request_cancel(false)
            .with_decision_timeout(Duration::from_millis(50));
        let filter = ToolCallFilter::with_config(config);
        let keep: Arc<parking_lot::Mutex<Vec<PendingConfirmation>>> = Arc::default();
        {
            let keep = keep.clone();
            filter.subscribe_fn(move |_call, pending| {
                keep.lock().push(pending);
                Ok(())
            });
        }

        let call = call();
        call.cancellation().cancel("ignored");

        let err = filter.request_decision(&call).await.unwrap_err();
        assert!(matches!(err, GateError::DecisionTimeout { .. }));
    }

    #[tokio::test]
    async fn test_cancel_with_abandoned_slot_reports_cancelled() {
        let filter = ToolCallFilter::new();
        filter.subscribe_fn(|call, pending| {
            call.cancellation().cancel("session closed");
            drop(pending);
            Ok(())
        });

        for _ in 0..200 {
            let err = filter.request_decision(&call()).await.unwrap_err();
            assert!(matches!(err, GateError::Cancelled(_)), "got {err:?}");
        }
    }

    #[tokio::test]
    async fn test_cancel_wins_over_same_instant_resolution() {
        let filter = ToolCallFilter::new();
        filter.subscribe_fn(|call, pending| {
            call.cancellation().cancel("session closed");
            pending.approve();
            Ok(())
        });

        for _ in 0..50 {
            let err = filter.request_decision(&call()).await.unwrap_err();
            assert!(matches!(err, GateError::Cancelled(_)));
        }
    }

    #[test]
    fn test_notify_reports_notified_handlers() {
        let filter = ToolCallFilter::new();
        let call = call();
        assert!(filter.notify(&call).unwrap().is_none());

        filter.subscribe(PolicyHandler::new(|_| true));
        filter.subscribe(PolicyHandler::new(|_| false));
        let wait = filter.notify(&call).unwrap().unwrap();
        assert_eq!(wait.notified(), 2);

        let mut task = tokio_test::task::spawn(wait.decision());
        let decision = assert_ready!(task.poll());
        assert!(decision.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_decision_timeout() {
        let filter =
            ToolCallFilter::with_config(GateConfig::default().with_decision_timeout(Duration::from_secs(30)));
        let keep: Arc<parking_lot::Mutex<Vec<PendingConfirmation>>> = Arc::default();
        {
            let keep = keep.clone();
            filter.subscribe_fn(move |_call, pending| {
                keep.lock().push(pending);
                Ok(())
            });
        }

        let err = filter.request_decision(&call()).await.unwrap_err();
        match err {
            GateError::DecisionTimeout { function, timeout } => {
                assert_eq!(function, "get_weather");
                assert_eq!(timeout, Duration::from_secs(30));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
