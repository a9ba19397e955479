//! Console input parsing and state rendering.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use telehealth_core::{
    model::{Role, SplatStatus},
    splat::model_url,
    store::SessionSnapshot,
};
use tokio::sync::watch;
use tracing::{info, warn};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Upload(Vec<PathBuf>),
    Quit,
    Nothing,
}

pub fn parse_line(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Nothing;
    }
    if line == "/quit" {
        return Command::Quit;
    }
    if let Some(rest) = line.strip_prefix("/upload") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Command::Upload(rest.split_whitespace().map(PathBuf::from).collect());
        }
    }
    Command::Chat(line.to_string())
}

/// Reads every image file for an upload, failing on the first unreadable one.
pub async fn read_images(paths: &[PathBuf]) -> std::io::Result<Vec<Bytes>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        images.push(Bytes::from(tokio::fs::read(path).await?));
    }
    Ok(images)
}

/// Something that changed between two published snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Connection { connected: bool, waiting_for_peer: bool },
    Message { sender: Role, text: String },
    Retracted { text: String },
    Splat { status: SplatStatus, model_url: Option<String> },
}

pub fn diff(
    prev: &SessionSnapshot,
    next: &SessionSnapshot,
    api_base_url: &str,
    now: DateTime<Utc>,
) -> Vec<Change> {
    let mut changes = Vec::new();
    if prev.connection != next.connection {
        changes.push(Change::Connection {
            connected: next.connection.connected,
            waiting_for_peer: next.connection.waiting_for_peer,
        });
    }
    for gone in prev
        .messages
        .iter()
        .filter(|p| !next.messages.iter().any(|m| m.id == p.id))
    {
        changes.push(Change::Retracted {
            text: gone.text.clone(),
        });
    }
    for added in next
        .messages
        .iter()
        .filter(|m| !prev.messages.iter().any(|p| p.id == m.id))
    {
        changes.push(Change::Message {
            sender: added.sender,
            text: added.text.clone(),
        });
    }
    if prev.splat_status != next.splat_status {
        changes.push(Change::Splat {
            status: next.splat_status,
            model_url: model_url(api_base_url, next.splat_status, now),
        });
    }
    changes
}

/// Logs every store change until the store goes away.
pub async fn render(mut rx: watch::Receiver<SessionSnapshot>, api_base_url: String) {
    let mut prev = rx.borrow_and_update().clone();
    while rx.changed().await.is_ok() {
        let next = rx.borrow_and_update().clone();
        for change in diff(&prev, &next, &api_base_url, Utc::now()) {
            match change {
                Change::Connection {
                    connected,
                    waiting_for_peer,
                } => info!(connected, waiting_for_peer, "Connection state changed"),
                Change::Message { sender, text } => info!(%sender, "{}", text),
                Change::Retracted { text } => warn!(%text, "Message was not delivered"),
                Change::Splat {
                    status,
                    model_url: Some(url),
                } => info!(%status, %url, "3D model is ready"),
                Change::Splat { status, .. } => info!(%status, "Splat status changed"),
            }
        }
        prev = next;
    }
}
