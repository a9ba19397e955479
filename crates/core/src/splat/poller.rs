//! Interval task that feeds status checks into the reconciler.

use super::reconciler::SplatReconciler;
use super::source::SplatStatusSource;
use crate::config::DEFAULT_POLL_INTERVAL;
use crate::model::SplatStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, info, trace, warn};

/// Owns the poll task. Dropping the handle stops polling.
pub struct PollerHandle {
    handle: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn stop(mut self) {
        self.abort();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Splat poller stopped.");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Spawns the poll loop. The first check runs immediately. While the status
/// is `done` no request is issued. A zero interval falls back to the default.
pub fn spawn_poller(
    reconciler: Arc<SplatReconciler>,
    source: Arc<dyn SplatStatusSource>,
    interval: Duration,
) -> PollerHandle {
    let interval = if interval.is_zero() {
        warn!(
            fallback_ms = DEFAULT_POLL_INTERVAL.as_millis() as u64,
            "Zero poll interval, using default"
        );
        DEFAULT_POLL_INTERVAL
    } else {
        interval
    };
    let span = tracing::info_span!("splat_poller", interval_ms = interval.as_millis() as u64);
    let handle = tokio::spawn(
        async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if reconciler.current() == SplatStatus::Done {
                    trace!("Model already available, skipping check");
                    continue;
                }
                let result = source.check().await;
                reconciler.apply_poll(result);
            }
        }
        .instrument(span),
    );
    PollerHandle {
        handle: Some(handle),
    }
}
