//! Session configuration shared by the store, the transports and the poller.

use crate::model::Role;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:8080/ws";
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_ARTIFACT_CONTENT_TYPE: &str = "model/vnd.usdz+zip";

/// Which wire protocol the real-time channel speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Plain text frames plus the "both connected" sentinel.
    #[default]
    Raw,
    /// JSON `{event, data}` envelopes.
    Multiplexed,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(TransportKind::Raw),
            "multiplexed" | "events" => Ok(TransportKind::Multiplexed),
            other => Err(format!("'{}' is not a valid transport", other)),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Raw => f.write_str("raw"),
            TransportKind::Multiplexed => f.write_str("multiplexed"),
        }
    }
}

/// Whether "waiting for peer" may turn back on once both parties were present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WaitingPolicy {
    /// Once cleared, the flag stays cleared for the session.
    #[default]
    Latch,
    /// A peer-left or own-disconnect signal re-arms the flag.
    RearmOnDisconnect,
}

impl FromStr for WaitingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latch" => Ok(WaitingPolicy::Latch),
            "rearm" | "rearm_on_disconnect" => Ok(WaitingPolicy::RearmOnDisconnect),
            other => Err(format!("'{}' is not a valid waiting policy", other)),
        }
    }
}

/// Capped exponential reconnect schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

/// Everything a `SessionContext` needs to run one participant's session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub role: Role,
    pub transport: TransportKind,
    pub relay_url: String,
    pub api_base_url: String,
    pub poll_interval: Duration,
    pub waiting_policy: WaitingPolicy,
    pub reconnect: ReconnectConfig,
    pub artifact_content_type: String,
}

impl SessionConfig {
    /// A configuration with local-development defaults for `role`.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            transport: TransportKind::default(),
            relay_url: DEFAULT_RELAY_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            waiting_policy: WaitingPolicy::default(),
            reconnect: ReconnectConfig::default(),
            artifact_content_type: DEFAULT_ARTIFACT_CONTENT_TYPE.to_string(),
        }
    }
}
