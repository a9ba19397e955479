//! Reference-counted ownership of the shared transport.
//!
//! Every consumer that needs the connection alive holds a [`TransportLease`].
//! The connection is closed when the last lease is released, so one consumer
//! unmounting never tears down a connection a sibling still uses.

use crate::transport::Transport;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

pub(crate) struct LeaseShared {
    transport: Arc<dyn Transport>,
    state: Mutex<LeaseState>,
}

struct LeaseState {
    holders: usize,
    released: bool,
}

impl LeaseShared {
    /// Wraps a freshly connected transport and hands out its first lease.
    pub(crate) fn open(transport: Arc<dyn Transport>) -> (Arc<Self>, TransportLease) {
        let shared = Arc::new(Self {
            transport,
            state: Mutex::new(LeaseState {
                holders: 1,
                released: false,
            }),
        });
        let lease = TransportLease {
            shared: shared.clone(),
        };
        (shared, lease)
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn is_released(&self) -> bool {
        self.lock().released
    }

    /// Hands out a new lease, or `None` once the connection was closed by
    /// its last holder.
    pub(crate) fn try_acquire(self: &Arc<Self>) -> Option<TransportLease> {
        let mut state = self.lock();
        if state.released {
            return None;
        }
        state.holders += 1;
        debug!(holders = state.holders, "Transport lease acquired");
        Some(TransportLease {
            shared: self.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LeaseState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A counted claim on the shared connection.
pub struct TransportLease {
    shared: Arc<LeaseShared>,
}

impl TransportLease {
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.shared.transport
    }

    /// Current number of live leases on this connection.
    pub fn holders(&self) -> usize {
        self.shared.lock().holders
    }

    /// Gives the claim up. Equivalent to dropping the lease.
    pub fn release(self) {}
}

impl Deref for TransportLease {
    type Target = dyn Transport;

    fn deref(&self) -> &Self::Target {
        self.shared.transport.as_ref()
    }
}

impl Clone for TransportLease {
    fn clone(&self) -> Self {
        self.shared.lock().holders += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for TransportLease {
    fn drop(&mut self) {
        let last = {
            let mut state = self.shared.lock();
            state.holders = state.holders.saturating_sub(1);
            if state.holders == 0 {
                state.released = true;
            }
            state.released
        };
        if last {
            info!("Last transport lease released, closing connection.");
            self.shared.transport.disconnect();
        }
    }
}
