//! Wire formats for the real-time channel.
//!
//! The raw format carries bare chat text plus one sentinel frame. The
//! multiplexed format wraps everything in a `{event, data}` envelope.

use crate::transport::TransportError;
use serde::{Deserialize, Serialize};
use telehealth_core::model::{Role, SplatStatus};
use tracing::{debug, warn};

/// Frame the relay sends once both participants are connected.
pub const BOTH_CONNECTED: &str = "Both connected";

/// What the application asks the transport to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPayload {
    Chat(String),
    SplatUpdate(SplatStatus),
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    PeerJoined(Role),
    PeerLeft(Role),
    Chat { text: String, sender: Role },
    SplatUpdate(SplatStatus),
}

pub trait WireCodec: Send + Sync + 'static {
    /// Frame sent right after every (re)connect, if any.
    fn handshake(&self, _local: Role) -> Option<String> {
        None
    }

    fn encode(&self, payload: &OutboundPayload, local: Role) -> Result<String, TransportError>;

    /// `None` means the frame carries nothing for the session.
    fn decode(&self, frame: &str, local: Role) -> Option<Inbound>;
}

/// Plain text frames. Sender identity is never on the wire: every chat frame
/// comes from the peer.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl WireCodec for RawCodec {
    fn encode(&self, payload: &OutboundPayload, _local: Role) -> Result<String, TransportError> {
        match payload {
            OutboundPayload::Chat(text) => Ok(text.clone()),
            OutboundPayload::SplatUpdate(_) => Err(TransportError::Unsupported(
                "splat updates need the multiplexed transport",
            )),
        }
    }

    fn decode(&self, frame: &str, local: Role) -> Option<Inbound> {
        // The sentinel has to be checked before generic chat dispatch.
        if frame == BOTH_CONNECTED {
            return Some(Inbound::PeerJoined(local.peer()));
        }
        Some(Inbound::Chat {
            text: frame.to_string(),
            sender: local.peer(),
        })
    }
}

/// Envelope of the multiplexed protocol.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum WireEvent {
    Join {
        #[serde(rename = "userType")]
        user_type: Role,
    },
    UserJoined {
        #[serde(rename = "type")]
        role: Role,
    },
    UserLeft {
        #[serde(rename = "type")]
        role: Role,
    },
    Message {
        text: String,
        sender: Role,
    },
    SplatUpdate {
        status: SplatStatus,
    },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EventCodec;

impl WireCodec for EventCodec {
    fn handshake(&self, local: Role) -> Option<String> {
        serde_json::to_string(&WireEvent::Join { user_type: local }).ok()
    }

    fn encode(&self, payload: &OutboundPayload, local: Role) -> Result<String, TransportError> {
        let event = match payload {
            OutboundPayload::Chat(text) => WireEvent::Message {
                text: text.clone(),
                sender: local,
            },
            OutboundPayload::SplatUpdate(status) => WireEvent::SplatUpdate { status: *status },
        };
        Ok(serde_json::to_string(&event)?)
    }

    fn decode(&self, frame: &str, local: Role) -> Option<Inbound> {
        let event = match serde_json::from_str::<WireEvent>(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping unrecognized event envelope");
                return None;
            }
        };
        match event {
            WireEvent::UserJoined { role } if role != local => Some(Inbound::PeerJoined(role)),
            WireEvent::UserLeft { role } if role != local => Some(Inbound::PeerLeft(role)),
            WireEvent::Message { text, sender } if sender != local => {
                Some(Inbound::Chat { text, sender })
            }
            WireEvent::SplatUpdate { status } => Some(Inbound::SplatUpdate(status)),
            other => {
                debug!(?other, "Ignoring own echo or client-only event");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_sentinel_is_peer_joined() {
        assert_eq!(
            RawCodec.decode("Both connected", Role::Patient),
            Some(Inbound::PeerJoined(Role::Doctor))
        );
    }

    #[test]
    fn test_raw_chat_is_attributed_to_peer() {
        assert_eq!(
            RawCodec.decode("How are you feeling?", Role::Patient),
            Some(Inbound::Chat {
                text: "How are you feeling?".into(),
                sender: Role::Doctor
            })
        );
        // Near-miss of the sentinel is ordinary chat.
        assert_eq!(
            RawCodec.decode("both connected", Role::Doctor),
            Some(Inbound::Chat {
                text: "both connected".into(),
                sender: Role::Patient
            })
        );
    }

    #[test]
    fn test_raw_rejects_splat_updates() {
        assert!(matches!(
            RawCodec.encode(&OutboundPayload::SplatUpdate(SplatStatus::Done), Role::Patient),
            Err(TransportError::Unsupported(_))
        ));
        assert_eq!(
            RawCodec
                .encode(&OutboundPayload::Chat("hi".into()), Role::Patient)
                .unwrap(),
            "hi"
        );
        assert_eq!(RawCodec.handshake(Role::Doctor), None);
    }

    #[test]
    fn test_event_handshake_is_join() {
        assert_eq!(
            EventCodec.handshake(Role::Doctor).unwrap(),
            r#"{"event":"join","data":{"userType":"doctor"}}"#
        );
    }

    #[test]
    fn test_event_encode_message_and_splat() {
        assert_eq!(
            EventCodec
                .encode(&OutboundPayload::Chat("hello".into()), Role::Patient)
                .unwrap(),
            r#"{"event":"message","data":{"text":"hello","sender":"patient"}}"#
        );
        assert_eq!(
            EventCodec
                .encode(&OutboundPayload::SplatUpdate(SplatStatus::Processing), Role::Patient)
                .unwrap(),
            r#"{"event":"splatUpdate","data":{"status":"processing"}}"#
        );
    }

    #[test]
    fn test_event_decode_peer_events() {
        let local = Role::Doctor;
        assert_eq!(
            EventCodec.decode(r#"{"event":"userJoined","data":{"type":"patient"}}"#, local),
            Some(Inbound::PeerJoined(Role::Patient))
        );
        assert_eq!(
            EventCodec.decode(r#"{"event":"userLeft","data":{"type":"patient"}}"#, local),
            Some(Inbound::PeerLeft(Role::Patient))
        );
        assert_eq!(
            EventCodec.decode(
                r#"{"event":"message","data":{"text":"my knee hurts","sender":"patient"}}"#,
                local
            ),
            Some(Inbound::Chat {
                text: "my knee hurts".into(),
                sender: Role::Patient
            })
        );
        assert_eq!(
            EventCodec.decode(r#"{"event":"splatUpdate","data":{"status":"done"}}"#, local),
            Some(Inbound::SplatUpdate(SplatStatus::Done))
        );
    }

    #[test]
    fn test_event_decode_ignores_own_echo() {
        let local = Role::Doctor;
        assert_eq!(
            EventCodec.decode(r#"{"event":"userJoined","data":{"type":"doctor"}}"#, local),
            None
        );
        assert_eq!(
            EventCodec.decode(
                r#"{"event":"message","data":{"text":"hi","sender":"doctor"}}"#,
                local
            ),
            None
        );
    }

    #[test]
    fn test_event_decode_drops_garbage() {
        assert_eq!(EventCodec.decode("Both connected", Role::Doctor), None);
        assert_eq!(
            EventCodec.decode(r#"{"event":"typing","data":{}}"#, Role::Doctor),
            None
        );
        assert_eq!(
            EventCodec.decode(r#"{"event":"splatUpdate","data":{"status":"exploded"}}"#, Role::Doctor),
            None
        );
    }
}
