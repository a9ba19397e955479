//! The connection task shared by both transport variants.
//!
//! One spawned task owns the websocket. Outbound frames reach it through a
//! channel and are acknowledged once the sink accepted them; inbound frames
//! are decoded by the variant's codec and applied to the store before the
//! matching event is emitted.

use crate::backoff::ReconnectPolicy;
use crate::codec::{Inbound, WireCodec};
use crate::transport::TransportError;
use futures_util::{FutureExt, SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use telehealth_core::{
    config::TransportKind,
    events::{EventBus, SessionEvent},
    model::Role,
    store::SessionStore,
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot, watch},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{Instrument, debug, error, info, warn};

const OUTBOUND_CAPACITY: usize = 64;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Outgoing {
    frame: String,
    ack: oneshot::Sender<Result<(), TransportError>>,
}

/// How a connected session ended.
enum Ended {
    /// `disconnect` was requested or every handle is gone.
    Shutdown,
    /// The peer closed or the socket failed.
    Dropped,
}

pub(crate) struct ConnectionParams {
    pub kind: TransportKind,
    pub url: String,
    pub role: Role,
    pub store: Arc<SessionStore>,
    pub events: Arc<EventBus>,
    pub policy: ReconnectPolicy,
}

/// Handle to the connection task.
pub(crate) struct Connection {
    open: Arc<AtomicBool>,
    outbound: mpsc::Sender<Outgoing>,
    shutdown: watch::Sender<bool>,
}

impl Connection {
    pub fn spawn<C: WireCodec>(codec: C, params: ConnectionParams) -> Self {
        let open = Arc::new(AtomicBool::new(false));
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let span = tracing::info_span!(
            "transport",
            kind = %params.kind,
            role = %params.role,
            url = %params.url
        );
        let driver = Driver {
            codec,
            params,
            open: open.clone(),
            outbound: outbound_rx,
            shutdown: shutdown_rx,
        };
        tokio::spawn(driver.run().instrument(span));

        Self {
            open,
            outbound,
            shutdown,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Writes one frame and waits for the sink to accept it. Failures are
    /// logged here; callers only decide what to do with the result.
    pub async fn send_frame(&self, frame: String) -> Result<(), TransportError> {
        if !self.is_open() {
            warn!("Connection is not open. Cannot send message.");
            return Err(TransportError::NotConnected);
        }
        let (ack, ack_rx) = oneshot::channel();
        let result = match self.outbound.send(Outgoing { frame, ack }).await {
            Ok(()) => ack_rx.await.unwrap_or(Err(TransportError::Closed)),
            Err(_) => Err(TransportError::Closed),
        };
        if let Err(e) = &result {
            warn!(error = %e, "Failed to send frame");
        }
        result
    }

    pub fn disconnect(&self) {
        if !self.shutdown.send_replace(true) {
            info!("Disconnect requested.");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

struct Driver<C> {
    codec: C,
    params: ConnectionParams,
    open: Arc<AtomicBool>,
    outbound: mpsc::Receiver<Outgoing>,
    shutdown: watch::Receiver<bool>,
}

impl<C: WireCodec> Driver<C> {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            info!("Connecting to relay...");
            let connected = tokio::select! {
                result = connect_async(self.params.url.as_str()) => result,
                _ = self.shutdown.wait_for(|stop| *stop) => break,
            };
            match connected {
                Ok((socket, _)) => {
                    attempt = 0;
                    if let Ended::Shutdown = self.session(socket).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect to relay");
                    self.params
                        .events
                        .emit(&SessionEvent::ConnectError(e.to_string()));
                }
            }

            attempt += 1;
            let Some(delay) = self.params.policy.delay_for(attempt) else {
                if let ReconnectPolicy::Backoff(_) = self.params.policy {
                    let attempts = attempt - 1;
                    error!(attempts, "Giving up on reconnecting");
                    self.params
                        .events
                        .emit(&SessionEvent::ReconnectFailed { attempts });
                }
                break;
            };
            info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
            self.params
                .events
                .emit(&SessionEvent::ReconnectAttempt { attempt, delay });
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.wait_for(|stop| *stop) => break,
            }
        }
        self.reject_queued();
        info!("Connection task finished.");
    }

    async fn session(&mut self, socket: Socket) -> Ended {
        let (mut sink, mut stream) = socket.split();
        let store = self.params.store.clone();
        let events = self.params.events.clone();

        if let Some(hello) = self.codec.handshake(self.params.role) {
            if let Err(e) = sink.send(WsMessage::Text(hello.into())).await {
                error!(error = %e, "Failed to send handshake");
                return Ended::Dropped;
            }
        }

        self.open.store(true, Ordering::Release);
        store.set_connected(true);
        info!("Connected successfully.");
        events.emit(&SessionEvent::Connect);

        let ended = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.wait_for(|stop| *stop).map(drop) => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    let _ = sink.close().await;
                    break Ended::Shutdown;
                },
                Some(out) = self.outbound.recv() => {
                    let result = sink
                        .send(WsMessage::Text(out.frame.into()))
                        .await
                        .map_err(|e| TransportError::Write(e.to_string()));
                    let failed = result.is_err();
                    let _ = out.ack.send(result);
                    if failed {
                        break Ended::Dropped;
                    }
                },
                msg = stream.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(inbound) = self.codec.decode(&text, self.params.role) {
                            apply(&self.params, inbound);
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("Relay closed the connection.");
                        break Ended::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "Error receiving from relay");
                        break Ended::Dropped;
                    }
                },
            }
        };

        self.open.store(false, Ordering::Release);
        self.reject_queued();
        store.set_connected(false);
        store.set_waiting_for_peer(true);
        info!("Connection closed.");
        events.emit(&SessionEvent::Disconnect);
        ended
    }

    /// Fails every frame queued while no socket is available.
    fn reject_queued(&mut self) {
        while let Ok(out) = self.outbound.try_recv() {
            let _ = out.ack.send(Err(TransportError::NotConnected));
        }
    }
}

/// Applies a decoded frame to the store, then notifies subscribers. Takes the
/// params alone so it can run while the shutdown receiver is borrowed.
fn apply(params: &ConnectionParams, inbound: Inbound) {
    let store = &params.store;
    let events = &params.events;
    match inbound {
        Inbound::PeerJoined(role) => {
            info!(peer = %role, "Both participants are connected");
            store.mark_peer_joined();
            events.emit(&SessionEvent::PeerJoined(role));
        }
        Inbound::PeerLeft(role) => {
            info!(peer = %role, "Peer left the session");
            store.set_waiting_for_peer(true);
            events.emit(&SessionEvent::PeerLeft(role));
        }
        Inbound::Chat { text, sender } => {
            let message = store.add_message(text, sender);
            debug!(id = %message.id, %sender, "Chat message received");
            events.emit(&SessionEvent::Message(message));
        }
        Inbound::SplatUpdate(status) => {
            debug!(%status, "Splat update pushed");
            events.emit(&SessionEvent::SplatUpdate(status));
        }
    }
}
