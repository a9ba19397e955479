//! Observable Session Store
//!
//! The single source of truth consumed by rendering code. Every mutation is a
//! single assignment applied under the watch channel's lock and published to
//! subscribers as a fresh [`SessionSnapshot`].

use crate::config::WaitingPolicy;
use crate::model::{ChatMessage, ConnectionState, Delivery, Role, SplatStatus};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Role already bound to {bound}, cannot rebind to {requested}")]
    RoleAlreadyBound { bound: Role, requested: Role },
    #[error("No role bound to this session")]
    RoleNotBound,
}

/// Everything the UI renders, published on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub role: Option<Role>,
    pub connection: ConnectionState,
    pub messages: Vec<ChatMessage>,
    pub splat_status: SplatStatus,
}

pub struct SessionStore {
    state: watch::Sender<SessionSnapshot>,
    waiting_policy: WaitingPolicy,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(WaitingPolicy::default())
    }
}

impl SessionStore {
    pub fn new(waiting_policy: WaitingPolicy) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            state,
            waiting_policy,
        }
    }

    /// Returns a receiver that observes every subsequent mutation.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn role(&self) -> Option<Role> {
        self.state.borrow().role
    }

    pub fn splat_status(&self) -> SplatStatus {
        self.state.borrow().splat_status
    }

    pub fn waiting_policy(&self) -> WaitingPolicy {
        self.waiting_policy
    }

    /// Binds the local role. Binding the same role again is a no-op.
    pub fn bind_role(&self, role: Role) -> Result<(), StoreError> {
        let mut result = Ok(());
        self.state.send_if_modified(|s| match s.role {
            None => {
                s.role = Some(role);
                true
            }
            Some(bound) if bound == role => false,
            Some(bound) => {
                result = Err(StoreError::RoleAlreadyBound {
                    bound,
                    requested: role,
                });
                false
            }
        });
        if result.is_ok() {
            debug!(%role, "Role bound");
        }
        result
    }

    /// Appends a confirmed message stamped with the local clock.
    pub fn add_message(&self, text: impl Into<String>, sender: Role) -> ChatMessage {
        self.push(ChatMessage::received(text, sender))
    }

    /// Appends a locally authored message in the pending sub-state.
    pub fn append_pending(&self, text: impl Into<String>) -> Result<ChatMessage, StoreError> {
        let role = self.role().ok_or(StoreError::RoleNotBound)?;
        Ok(self.push(ChatMessage::pending(text, role)))
    }

    fn push(&self, message: ChatMessage) -> ChatMessage {
        let appended = message.clone();
        self.state.send_modify(|s| s.messages.push(message));
        appended
    }

    /// Promotes a pending message to confirmed, keeping its position.
    pub fn confirm(&self, id: Uuid) -> bool {
        self.state.send_if_modified(|s| {
            match s.messages.iter_mut().find(|m| m.id == id && m.is_pending()) {
                Some(message) => {
                    message.delivery = Delivery::Confirmed;
                    true
                }
                None => false,
            }
        })
    }

    /// Removes a pending message whose send failed. Confirmed messages are
    /// never removed.
    pub fn rollback(&self, id: Uuid) -> bool {
        self.state.send_if_modified(|s| {
            let before = s.messages.len();
            s.messages.retain(|m| !(m.id == id && m.is_pending()));
            s.messages.len() != before
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.send_if_modified(|s| {
            let changed = s.connection.connected != connected;
            s.connection.connected = connected;
            changed
        });
    }

    /// Clears the waiting flag: both participants are present.
    pub fn mark_peer_joined(&self) {
        self.set_waiting_for_peer(false);
    }

    /// Sets the waiting flag. Re-arming after it was cleared only happens
    /// under [`WaitingPolicy::RearmOnDisconnect`].
    pub fn set_waiting_for_peer(&self, waiting: bool) {
        let policy = self.waiting_policy;
        self.state.send_if_modified(|s| {
            let current = s.connection.waiting_for_peer;
            if current == waiting {
                return false;
            }
            if waiting && policy == WaitingPolicy::Latch {
                debug!("Ignoring waiting re-arm, flag is latched");
                return false;
            }
            s.connection.waiting_for_peer = waiting;
            true
        });
    }

    /// Unconditional overwrite. Monotonicity is the caller's contract.
    pub fn set_splat_status(&self, status: SplatStatus) {
        self.state.send_if_modified(|s| {
            let changed = s.splat_status != status;
            s.splat_status = status;
            changed
        });
    }

    /// Atomically computes the next status from the current one. `decide`
    /// returns `None` to leave the status untouched. Returns the previous
    /// and resulting status.
    pub fn transition_splat<F>(&self, decide: F) -> (SplatStatus, SplatStatus)
    where
        F: FnOnce(SplatStatus) -> Option<SplatStatus>,
    {
        let mut outcome = (SplatStatus::default(), SplatStatus::default());
        self.state.send_if_modified(|s| {
            let previous = s.splat_status;
            let next = decide(previous).unwrap_or(previous);
            s.splat_status = next;
            outcome = (previous, next);
            previous != next
        });
        if outcome.0 != outcome.1 {
            info!(from = %outcome.0, to = %outcome.1, "Splat status changed");
        }
        outcome
    }

    /// Number of messages still waiting for transport acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.state
            .borrow()
            .messages
            .iter()
            .filter(|m| m.is_pending())
            .count()
    }
}
