//! Session Data Model
//!
//! The participant roles, chat messages and splat job status shared between
//! the store, the transports and the reconciler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One of the two fixed participant kinds in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    Patient,
}

impl Role {
    /// The other participant. Sessions are strictly two-party.
    pub fn peer(self) -> Self {
        match self {
            Role::Doctor => Role::Patient,
            Role::Patient => Role::Doctor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            other => Err(format!("'{}' is not a valid role", other)),
        }
    }
}

/// Delivery sub-state of a chat message in the local log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Appended locally, waiting for the transport to accept the write.
    Pending,
    /// Accepted by the transport, or received from the peer.
    Confirmed,
}

/// A single entry of the append-only message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    pub sender: Role,
    /// Local receipt or send time. Remote clocks are never trusted.
    pub timestamp: DateTime<Utc>,
    pub delivery: Delivery,
}

impl ChatMessage {
    /// A message received from the peer, confirmed on arrival.
    pub fn received(text: impl Into<String>, sender: Role) -> Self {
        Self::stamped(text.into(), sender, Delivery::Confirmed)
    }

    /// A locally authored message that has not been acknowledged yet.
    pub fn pending(text: impl Into<String>, sender: Role) -> Self {
        Self::stamped(text.into(), sender, Delivery::Pending)
    }

    fn stamped(text: String, sender: Role, delivery: Delivery) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            sender,
            timestamp: Utc::now(),
            delivery,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.delivery == Delivery::Pending
    }
}

/// Lifecycle of the asynchronously generated 3D model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplatStatus {
    #[default]
    Unavailable,
    Processing,
    Done,
}

impl SplatStatus {
    /// Position along `unavailable -> processing -> done`.
    pub fn rank(self) -> u8 {
        match self {
            SplatStatus::Unavailable => 0,
            SplatStatus::Processing => 1,
            SplatStatus::Done => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SplatStatus::Unavailable => "unavailable",
            SplatStatus::Processing => "processing",
            SplatStatus::Done => "done",
        }
    }
}

impl fmt::Display for SplatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection flags published to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub connected: bool,
    pub waiting_for_peer: bool,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            connected: false,
            waiting_for_peer: true,
        }
    }
}
