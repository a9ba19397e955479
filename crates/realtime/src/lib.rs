//! Telehealth Real-time Session Layer
//!
//! Normalizes the real-time channel between the two participants into the
//! typed events of `telehealth_core::events`, and wires it to the session
//! store and the splat reconciler.
//!
//! - `codec`: frame encoding for the raw and the event-multiplexed wire formats.
//! - `transport`: the `Transport` interface and its two variants.
//! - `backoff`: the capped exponential reconnect schedule.
//! - `lease`: reference-counted ownership of the shared connection.
//! - `session`: the explicitly constructed `SessionContext`.

pub mod backoff;
pub mod codec;
mod connection;
pub mod lease;
pub mod session;
pub mod transport;

pub use lease::TransportLease;
pub use session::{SendOutcome, SessionContext};
pub use transport::{
    MultiplexedEventTransport, OutboundPayload, RawSocketTransport, Transport, TransportError,
};
