//! The stable transport contract and its two wire variants.

pub mod multiplexed;
pub mod raw;

pub use crate::codec::OutboundPayload;
pub use multiplexed::MultiplexedEventTransport;
pub use raw::RawSocketTransport;

use async_trait::async_trait;
use std::sync::Arc;
use telehealth_core::{
    config::{SessionConfig, TransportKind},
    events::{EventBus, EventKind, Handler, HandlerId},
    store::SessionStore,
};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection is not open")]
    NotConnected,
    #[error("Connection closed before the write was acknowledged")]
    Closed,
    #[error("Unsupported payload: {0}")]
    Unsupported(&'static str),
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to write frame: {0}")]
    Write(String),
}

/// One contract regardless of the wire protocol underneath.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    fn is_open(&self) -> bool;

    /// Best effort. A closed connection is logged and reported as
    /// [`TransportError::NotConnected`]; nothing is queued for retry.
    async fn send(&self, payload: OutboundPayload) -> Result<(), TransportError>;

    /// Closes the underlying connection. Safe to call more than once.
    fn disconnect(&self);

    fn events(&self) -> &EventBus;

    fn on(&self, kind: EventKind, handler: Handler) -> HandlerId {
        self.events().register(kind, handler)
    }

    fn off(&self, kind: EventKind) {
        self.events().off(kind)
    }
}

/// Opens the transport variant selected by `config.transport`.
pub fn connect(
    config: &SessionConfig,
    store: Arc<SessionStore>,
    events: Arc<EventBus>,
) -> Arc<dyn Transport> {
    match config.transport {
        TransportKind::Raw => Arc::new(RawSocketTransport::connect(config, store, events)),
        TransportKind::Multiplexed => {
            Arc::new(MultiplexedEventTransport::connect(config, store, events))
        }
    }
}
