//! Merges push and poll signals into one forward-only status.

use super::source::{PollError, PollOutcome};
use crate::model::SplatStatus;
use crate::notify::{Notification, Notifier};
use crate::store::SessionStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything that can move the splat status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    UploadSucceeded,
    UploadFailed,
    Push(SplatStatus),
    Poll(PollOutcome),
}

/// Pure transition rule. `None` means the status stays as it is.
///
/// Only [`Signal::UploadFailed`] may move the status backwards. Every other
/// signal can only advance along `unavailable -> processing -> done`, so a
/// stale push or a 404 seen while the job runs never regresses the state.
pub fn next_status(current: SplatStatus, signal: &Signal) -> Option<SplatStatus> {
    match signal {
        Signal::UploadFailed => Some(SplatStatus::Unavailable),
        Signal::UploadSucceeded => advance(current, SplatStatus::Processing),
        Signal::Push(status) => advance(current, *status),
        Signal::Poll(PollOutcome::ArtifactPresent) => advance(current, SplatStatus::Done),
        Signal::Poll(PollOutcome::Status(status)) => advance(current, *status),
        // Not found while processing means "not ready yet"; while done it
        // would be a regression. Either way nothing moves.
        Signal::Poll(PollOutcome::NotFound) => None,
    }
}

fn advance(current: SplatStatus, target: SplatStatus) -> Option<SplatStatus> {
    (target.rank() > current.rank()).then_some(target)
}

/// Applies signals to the store and raises the ready notification once per
/// transition into `done`.
pub struct SplatReconciler {
    store: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
}

impl SplatReconciler {
    pub fn new(store: Arc<SessionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn current(&self) -> SplatStatus {
        self.store.splat_status()
    }

    pub fn apply(&self, signal: Signal) -> SplatStatus {
        let (previous, next) = self
            .store
            .transition_splat(|current| next_status(current, &signal));

        if previous == next {
            debug!(?signal, status = %next, "Splat signal left status unchanged");
        } else if next == SplatStatus::Done {
            self.notifier.notify(Notification::SplatReady);
        }
        next
    }

    pub fn on_upload_succeeded(&self) -> SplatStatus {
        self.apply(Signal::UploadSucceeded)
    }

    pub fn on_upload_failed(&self, reason: impl Into<String>) -> SplatStatus {
        let status = self.apply(Signal::UploadFailed);
        self.notifier.notify(Notification::UploadFailed(reason.into()));
        status
    }

    pub fn apply_push(&self, status: SplatStatus) -> SplatStatus {
        self.apply(Signal::Push(status))
    }

    /// Poll failures are transient: they are logged and the status is kept.
    pub fn apply_poll(&self, result: Result<PollOutcome, PollError>) -> SplatStatus {
        match result {
            Ok(outcome) => self.apply(Signal::Poll(outcome)),
            Err(e) => {
                warn!(error = %e, "Splat status check failed, retrying next tick");
                self.current()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MockNotifier;

    const ALL: [SplatStatus; 3] = [
        SplatStatus::Unavailable,
        SplatStatus::Processing,
        SplatStatus::Done,
    ];

    fn reconciler_with(notifier: MockNotifier) -> (Arc<SessionStore>, SplatReconciler) {
        let store = Arc::new(SessionStore::default());
        let reconciler = SplatReconciler::new(store.clone(), Arc::new(notifier));
        (store, reconciler)
    }

    fn silent() -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();
        notifier
    }

    #[test]
    fn test_transition_table() {
        use SplatStatus::*;
        assert_eq!(next_status(Unavailable, &Signal::UploadSucceeded), Some(Processing));
        assert_eq!(
            next_status(Processing, &Signal::Poll(PollOutcome::ArtifactPresent)),
            Some(Done)
        );
        assert_eq!(next_status(Processing, &Signal::Push(Done)), Some(Done));
        assert_eq!(next_status(Processing, &Signal::Poll(PollOutcome::NotFound)), None);
        assert_eq!(next_status(Done, &Signal::UploadFailed), Some(Unavailable));
        assert_eq!(next_status(Done, &Signal::UploadSucceeded), None);
    }

    #[test]
    fn test_no_implicit_regression_from_any_state() {
        let signals = [
            Signal::UploadSucceeded,
            Signal::Push(SplatStatus::Unavailable),
            Signal::Push(SplatStatus::Processing),
            Signal::Push(SplatStatus::Done),
            Signal::Poll(PollOutcome::NotFound),
            Signal::Poll(PollOutcome::ArtifactPresent),
            Signal::Poll(PollOutcome::Status(SplatStatus::Unavailable)),
            Signal::Poll(PollOutcome::Status(SplatStatus::Processing)),
        ];
        for current in ALL {
            for signal in &signals {
                let next = next_status(current, signal).unwrap_or(current);
                assert!(
                    next.rank() >= current.rank(),
                    "{:?} regressed {} to {}",
                    signal,
                    current,
                    next
                );
            }
        }
    }

    #[test]
    fn test_not_found_while_processing_is_idempotent() {
        let (store, reconciler) = reconciler_with(silent());
        store.set_splat_status(SplatStatus::Processing);
        let before = store.snapshot();

        reconciler.apply_poll(Ok(PollOutcome::NotFound));

        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_push_processing_does_not_override_done() {
        let (store, reconciler) = reconciler_with(silent());
        store.set_splat_status(SplatStatus::Done);

        assert_eq!(reconciler.apply_push(SplatStatus::Processing), SplatStatus::Done);
    }

    #[test]
    fn test_poll_failure_leaves_status() {
        let (store, reconciler) = reconciler_with(silent());
        store.set_splat_status(SplatStatus::Processing);

        let status = reconciler.apply_poll(Err(PollError::UnexpectedStatus(502)));

        assert_eq!(status, SplatStatus::Processing);
    }

    #[test]
    fn test_ready_notification_fires_once_across_repeated_done_polls() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| *n == Notification::SplatReady)
            .times(1)
            .return_const(());
        let (store, reconciler) = reconciler_with(notifier);

        assert_eq!(reconciler.on_upload_succeeded(), SplatStatus::Processing);
        for _ in 0..5 {
            reconciler.apply_poll(Ok(PollOutcome::ArtifactPresent));
        }
        reconciler.apply_push(SplatStatus::Done);
        reconciler.apply_poll(Ok(PollOutcome::Status(SplatStatus::Done)));

        assert_eq!(store.splat_status(), SplatStatus::Done);
    }

    #[test]
    fn test_upload_failure_resets_and_notifies() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| matches!(n, Notification::UploadFailed(reason) if reason == "HTTP 500"))
            .times(1)
            .return_const(());
        let (store, reconciler) = reconciler_with(notifier);
        store.set_splat_status(SplatStatus::Processing);

        assert_eq!(reconciler.on_upload_failed("HTTP 500"), SplatStatus::Unavailable);
    }

    #[test]
    fn test_ready_notifies_again_after_failure_reset() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| *n == Notification::SplatReady)
            .times(2)
            .return_const(());
        notifier
            .expect_notify()
            .withf(|n| matches!(n, Notification::UploadFailed(_)))
            .times(1)
            .return_const(());
        let (_store, reconciler) = reconciler_with(notifier);

        reconciler.on_upload_succeeded();
        reconciler.apply_poll(Ok(PollOutcome::ArtifactPresent));
        reconciler.on_upload_failed("network");
        reconciler.on_upload_succeeded();
        reconciler.apply_poll(Ok(PollOutcome::ArtifactPresent));
    }

    #[test]
    fn test_upload_then_artifact_scenario() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| *n == Notification::SplatReady)
            .times(1)
            .return_const(());
        let (store, reconciler) = reconciler_with(notifier);

        reconciler.on_upload_succeeded();
        assert_eq!(store.splat_status(), SplatStatus::Processing);

        reconciler.apply_poll(Ok(PollOutcome::NotFound));
        assert_eq!(store.splat_status(), SplatStatus::Processing);

        reconciler.apply_poll(Ok(PollOutcome::ArtifactPresent));
        assert_eq!(store.splat_status(), SplatStatus::Done);

        reconciler.apply_poll(Ok(PollOutcome::ArtifactPresent));
        assert_eq!(store.splat_status(), SplatStatus::Done);
    }
}
