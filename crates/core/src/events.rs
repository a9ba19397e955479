//! Typed publish/subscribe for session events.
//!
//! Handlers are keyed by a closed [`EventKind`] and invoked in registration
//! order. Each handler runs to completion before the next one starts.

use crate::model::{ChatMessage, Role, SplatStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    ConnectError,
    Message,
    PeerJoined,
    PeerLeft,
    SplatUpdate,
    ReconnectAttempt,
    ReconnectFailed,
}

/// Events published by the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The underlying connection opened.
    Connect,
    /// The underlying connection closed.
    Disconnect,
    /// Opening the connection failed.
    ConnectError(String),
    /// A chat message from the peer, already appended to the store.
    Message(ChatMessage),
    /// Both participants are present.
    PeerJoined(Role),
    /// The peer left the session.
    PeerLeft(Role),
    /// An in-band splat status notification.
    SplatUpdate(SplatStatus),
    ReconnectAttempt { attempt: u32, delay: Duration },
    ReconnectFailed { attempts: u32 },
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::Connect => EventKind::Connect,
            SessionEvent::Disconnect => EventKind::Disconnect,
            SessionEvent::ConnectError(_) => EventKind::ConnectError,
            SessionEvent::Message(_) => EventKind::Message,
            SessionEvent::PeerJoined(_) => EventKind::PeerJoined,
            SessionEvent::PeerLeft(_) => EventKind::PeerLeft,
            SessionEvent::SplatUpdate(_) => EventKind::SplatUpdate,
            SessionEvent::ReconnectAttempt { .. } => EventKind::ReconnectAttempt,
            SessionEvent::ReconnectFailed { .. } => EventKind::ReconnectFailed,
        }
    }
}

pub type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Identifies one registration so it can be removed on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<(HandlerId, Handler)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`. Every registration is kept until it is
    /// explicitly removed.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler))
    }

    pub fn register(&self, kind: EventKind, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().entry(kind).or_default().push((id, handler));
        id
    }

    /// Clears every handler registered for `kind`.
    pub fn off(&self, kind: EventKind) {
        self.lock().remove(&kind);
    }

    /// Removes a single registration. Returns whether it was present.
    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.lock();
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(h, _)| *h == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Invokes every handler for the event's kind, in registration order.
    pub fn emit(&self, event: &SessionEvent) {
        // Snapshot first so handlers can register or emit re-entrantly.
        let handlers: Vec<Handler> = self
            .lock()
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        trace!(kind = ?event.kind(), handlers = handlers.len(), "Dispatching session event");
        for handler in handlers {
            handler(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<(HandlerId, Handler)>>> {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
