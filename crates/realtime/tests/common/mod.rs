#![allow(dead_code)]

//! A minimal in-process relay speaking both wire formats.

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telehealth_core::store::{SessionSnapshot, SessionStore};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Raw,
    Events,
}

struct Peer {
    id: u64,
    role: Option<String>,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Clone)]
struct Relay {
    mode: Mode,
    next_id: Arc<AtomicU64>,
    peers: Arc<Mutex<Vec<Peer>>>,
}

impl Relay {
    fn broadcast(&self, from: u64, text: &str) {
        for peer in self.peers.lock().unwrap().iter().filter(|p| p.id != from) {
            let _ = peer.tx.send(Message::Text(text.to_string().into()));
        }
    }

    fn send_to(&self, to: u64, text: &str) {
        if let Some(peer) = self.peers.lock().unwrap().iter().find(|p| p.id == to) {
            let _ = peer.tx.send(Message::Text(text.to_string().into()));
        }
    }
}

pub struct TestRelay {
    pub url: String,
    relay: Relay,
}

impl TestRelay {
    pub async fn start(mode: Mode) -> Self {
        let relay = Relay {
            mode,
            next_id: Arc::new(AtomicU64::new(0)),
            peers: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/ws", get(upgrade))
            .with_state(relay.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("ws://{addr}/ws"),
            relay,
        }
    }

    /// Closes every client connection from the relay side.
    pub fn kick_all(&self) {
        for peer in self.relay.peers.lock().unwrap().drain(..) {
            let _ = peer.tx.send(Message::Close(None));
        }
    }

    pub fn client_count(&self) -> usize {
        self.relay.peers.lock().unwrap().len()
    }

    /// The client side may finish its handshake before the relay registered it.
    pub async fn wait_for_clients(&self, count: usize) {
        tokio::time::timeout(TIMEOUT, async {
            while self.client_count() != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("relay never saw the expected clients");
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(relay): State<Relay>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle(socket, relay))
}

async fn handle(socket: WebSocket, relay: Relay) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let id = relay.next_id.fetch_add(1, Ordering::Relaxed);

    let count = {
        let mut peers = relay.peers.lock().unwrap();
        peers.push(Peer {
            id,
            role: None,
            tx,
        });
        peers.len()
    };
    if relay.mode == Mode::Raw && count == 2 {
        for peer in relay.peers.lock().unwrap().iter() {
            let _ = peer.tx.send(Message::Text("Both connected".into()));
        }
    }

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else {
            if let Message::Close(_) = msg {
                break;
            }
            continue;
        };
        match relay.mode {
            Mode::Raw => relay.broadcast(id, text.as_str()),
            Mode::Events => on_event(&relay, id, text.as_str()),
        }
    }

    let role = {
        let mut peers = relay.peers.lock().unwrap();
        let role = peers.iter().find(|p| p.id == id).and_then(|p| p.role.clone());
        peers.retain(|p| p.id != id);
        role
    };
    if let (Mode::Events, Some(role)) = (relay.mode, role) {
        let left = json!({"event": "userLeft", "data": {"type": role}}).to_string();
        relay.broadcast(id, &left);
    }
    writer.abort();
}

fn on_event(relay: &Relay, id: u64, text: &str) {
    let Ok(envelope) = serde_json::from_str::<Value>(text) else {
        return;
    };
    match envelope["event"].as_str() {
        Some("join") => {
            let Some(role) = envelope["data"]["userType"].as_str().map(str::to_string) else {
                return;
            };
            let present: Vec<String> = {
                let mut peers = relay.peers.lock().unwrap();
                if let Some(me) = peers.iter_mut().find(|p| p.id == id) {
                    me.role = Some(role.clone());
                }
                peers
                    .iter()
                    .filter(|p| p.id != id)
                    .filter_map(|p| p.role.clone())
                    .collect()
            };
            let joined = json!({"event": "userJoined", "data": {"type": role}}).to_string();
            relay.broadcast(id, &joined);
            for other in present {
                let replay = json!({"event": "userJoined", "data": {"type": other}}).to_string();
                relay.send_to(id, &replay);
            }
        }
        Some("message") | Some("splatUpdate") => relay.broadcast(id, text),
        _ => {}
    }
}

/// Routes library logs to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Waits until the store's snapshot satisfies `pred`.
pub async fn wait_until<F>(store: &SessionStore, pred: F) -> SessionSnapshot
where
    F: FnMut(&SessionSnapshot) -> bool,
{
    let mut rx = store.subscribe();
    let snapshot = tokio::time::timeout(TIMEOUT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for store state")
        .expect("store dropped")
        .clone();
    snapshot
}

/// A relay URL nobody listens on.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}/ws")
}
