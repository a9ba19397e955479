//! Plain websocket transport: text frames and the "both connected" sentinel.

use super::{OutboundPayload, Transport, TransportError};
use crate::backoff::ReconnectPolicy;
use crate::codec::{RawCodec, WireCodec};
use crate::connection::{Connection, ConnectionParams};
use async_trait::async_trait;
use std::sync::Arc;
use telehealth_core::{
    config::{SessionConfig, TransportKind},
    events::EventBus,
    model::Role,
    store::SessionStore,
};
use tracing::warn;

/// The minimal contract: no reconnection, chat only.
pub struct RawSocketTransport {
    role: Role,
    events: Arc<EventBus>,
    connection: Connection,
}

impl RawSocketTransport {
    pub fn connect(config: &SessionConfig, store: Arc<SessionStore>, events: Arc<EventBus>) -> Self {
        let connection = Connection::spawn(
            RawCodec,
            ConnectionParams {
                kind: TransportKind::Raw,
                url: config.relay_url.clone(),
                role: config.role,
                store,
                events: events.clone(),
                policy: ReconnectPolicy::Never,
            },
        );
        Self {
            role: config.role,
            events,
            connection,
        }
    }
}

#[async_trait]
impl Transport for RawSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Raw
    }

    fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    async fn send(&self, payload: OutboundPayload) -> Result<(), TransportError> {
        let frame = RawCodec.encode(&payload, self.role).inspect_err(|e| {
            warn!(error = %e, "Payload cannot be sent over the raw transport");
        })?;
        self.connection.send_frame(frame).await
    }

    fn disconnect(&self) {
        self.connection.disconnect();
    }

    fn events(&self) -> &EventBus {
        &self.events
    }
}
