//! Session Context
//!
//! The explicitly constructed owner of one participant's session: the store,
//! the event bus, the splat reconciler and the lazily opened transport. Every
//! consumer receives the context (or an `Arc` of it) instead of reaching for
//! process-wide state.

use crate::lease::{LeaseShared, TransportLease};
use crate::transport::{self, OutboundPayload, Transport, TransportError};
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use telehealth_core::{
    UPLOAD_ANNOUNCEMENT,
    config::{SessionConfig, TransportKind},
    events::{EventBus, EventKind, HandlerId, SessionEvent},
    model::SplatStatus,
    notify::Notifier,
    splat::{PollerHandle, SplatReconciler, SplatStatusSource, SplatUploader, spawn_poller},
    store::{SessionStore, StoreError},
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Result of a chat send, after the pending entry was settled.
#[derive(Debug)]
pub enum SendOutcome {
    /// Nothing to send after trimming.
    Empty,
    /// Acknowledged by the transport and confirmed in the log.
    Sent(Uuid),
    /// Not delivered; the pending entry was rolled back.
    Failed(TransportError),
    /// The store refused to author the message, so nothing was appended.
    Rejected(StoreError),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent(_))
    }
}

pub struct SessionContext {
    config: SessionConfig,
    store: Arc<SessionStore>,
    events: Arc<EventBus>,
    reconciler: Arc<SplatReconciler>,
    transport: Mutex<Option<Arc<LeaseShared>>>,
    push_handler: HandlerId,
}

impl SessionContext {
    /// Builds the session for `config.role` and routes in-band splat
    /// notifications into the reconciler.
    pub fn new(config: SessionConfig, notifier: Arc<dyn Notifier>) -> Result<Self, StoreError> {
        let store = Arc::new(SessionStore::new(config.waiting_policy));
        store.bind_role(config.role)?;
        let events = Arc::new(EventBus::new());
        let reconciler = Arc::new(SplatReconciler::new(store.clone(), notifier));

        let push_target = reconciler.clone();
        let push_handler = events.on(EventKind::SplatUpdate, move |event| {
            if let SessionEvent::SplatUpdate(status) = event {
                push_target.apply_push(*status);
            }
        });

        info!(role = %config.role, transport = %config.transport, "Session context created");
        Ok(Self {
            config,
            store,
            events,
            reconciler,
            transport: Mutex::new(None),
            push_handler,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn reconciler(&self) -> &Arc<SplatReconciler> {
        &self.reconciler
    }

    /// Returns a lease on the session's connection, opening it on first use.
    /// All leases share one connection until the last one is released; a
    /// later call after that opens a fresh connection.
    pub fn transport(&self) -> TransportLease {
        let mut slot = self.transport.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lease) = slot.as_ref().and_then(|shared| shared.try_acquire()) {
            return lease;
        }
        let (shared, lease) = LeaseShared::open(transport::connect(
            &self.config,
            self.store.clone(),
            self.events.clone(),
        ));
        *slot = Some(shared);
        lease
    }

    /// The live connection, without taking a lease on it.
    fn current_transport(&self) -> Option<Arc<dyn Transport>> {
        let slot = self.transport.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .filter(|shared| !shared.is_released())
            .map(|shared| shared.transport().clone())
    }

    /// Sends a chat line with two-phase delivery: the message is appended as
    /// pending, then confirmed on acknowledgment or rolled back on failure.
    #[instrument(skip(self, text), fields(role = %self.config.role))]
    pub async fn send_chat(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Empty;
        }
        let pending = match self.store.append_pending(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Cannot author a message");
                return SendOutcome::Rejected(e);
            }
        };

        let result = match self.current_transport() {
            Some(transport) => transport.send(OutboundPayload::Chat(text.to_string())).await,
            None => {
                warn!("No open transport. Cannot send message.");
                Err(TransportError::NotConnected)
            }
        };

        match result {
            Ok(()) => {
                self.store.confirm(pending.id);
                debug!(id = %pending.id, "Message confirmed");
                SendOutcome::Sent(pending.id)
            }
            Err(e) => {
                self.store.rollback(pending.id);
                debug!(id = %pending.id, error = %e, "Message rolled back");
                SendOutcome::Failed(e)
            }
        }
    }

    /// Uploads images for reconstruction. Success moves the status to
    /// `processing` and tells the peer; failure resets it to `unavailable`
    /// and raises a notification.
    #[instrument(skip_all, fields(count = images.len()))]
    pub async fn upload_images(&self, uploader: &dyn SplatUploader, images: Vec<Bytes>) -> SplatStatus {
        if let Err(e) = uploader.upload(images).await {
            warn!(error = %e, "Image upload failed");
            return self.reconciler.on_upload_failed(e.to_string());
        }

        let status = self.reconciler.on_upload_succeeded();
        if let Some(transport) = self.current_transport() {
            if transport.kind() == TransportKind::Multiplexed {
                let _ = transport
                    .send(OutboundPayload::SplatUpdate(SplatStatus::Processing))
                    .await;
            }
        }
        self.send_chat(UPLOAD_ANNOUNCEMENT).await;
        status
    }

    /// Starts polling `source` at the configured interval.
    pub fn start_polling(&self, source: Arc<dyn SplatStatusSource>) -> PollerHandle {
        spawn_poller(self.reconciler.clone(), source, self.config.poll_interval)
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.events.remove(self.push_handler);
    }
}
