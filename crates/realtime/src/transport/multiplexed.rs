//! Event-multiplexed transport: JSON `{event, data}` envelopes with a join
//! handshake and bounded reconnection.

use super::{OutboundPayload, Transport, TransportError};
use crate::backoff::ReconnectPolicy;
use crate::codec::{EventCodec, WireCodec};
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

pub struct MultiplexedEventTransport {
    role: Role,
    events: Arc<EventBus>,
    connection: Connection,
}

impl MultiplexedEventTransport {
    /// Connects and re-joins after every reconnect. Reconnect attempts follow
    /// `config.reconnect` and are reported as `ReconnectAttempt` events,
    /// followed by a single `ReconnectFailed` once the budget is spent.
    pub fn connect(config: &SessionConfig, store: Arc<SessionStore>, events: Arc<EventBus>) -> Self {
        let connection = Connection::spawn(
            EventCodec,
            ConnectionParams {
                kind: TransportKind::Multiplexed,
                url: config.relay_url.clone(),
                role: config.role,
                store,
                events: events.clone(),
                policy: ReconnectPolicy::Backoff(config.reconnect),
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
impl Transport for MultiplexedEventTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Multiplexed
    }

    fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    async fn send(&self, payload: OutboundPayload) -> Result<(), TransportError> {
        let frame = EventCodec.encode(&payload, self.role).inspect_err(|e| {
            warn!(error = %e, "Failed to encode event envelope");
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
