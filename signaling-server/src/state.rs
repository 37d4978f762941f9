//! Shared application state for the signaling service.
//!
//! Holds the database pool plus the registry of currently connected
//! signaling endpoints, keyed by device id. The registry uses [`DashMap`]
//! so that connect/route/supersede all happen without a global lock.

use crate::config::Config;
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tunnel_protocol::signaling::ServerSignal;

/// An item pushed onto an endpoint's outbound queue: either a signaling
/// message to serialize and send, or an instruction to close the socket
/// with a reason (used for supersession).
pub enum EndpointEvent {
    Message(ServerSignal),
    Close(&'static str),
}

/// Outbound queue for a single connected endpoint's signaling socket.
pub type EndpointTx = mpsc::UnboundedSender<EndpointEvent>;

#[derive(Clone)]
struct EndpointEntry {
    user_id: i64,
    tx: EndpointTx,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    endpoints: Arc<DashMap<String, EndpointEntry>>,
}

/// What happened when a device id tried to occupy the signaling registry.
pub enum Admission {
    /// No prior holder; the new connection is now registered.
    Admitted,
    /// A prior connection under the same device id was superseded and
    /// sent a close instruction.
    Superseded,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            endpoints: Arc::new(DashMap::new()),
        }
    }

    /// Atomically takes ownership of `device_id` in the registry, replacing
    /// any previous holder in a single map operation so two concurrent
    /// admissions can never both believe they're the sole occupant. A
    /// superseded prior holder is sent a close instruction before this
    /// call returns.
    pub fn admit(&self, device_id: &str, user_id: i64, tx: EndpointTx) -> Admission {
        let prior = self
            .endpoints
            .insert(device_id.to_string(), EndpointEntry { user_id, tx });
        match prior {
            Some(prior) => {
                let _ = prior.tx.send(EndpointEvent::Close("superseded"));
                Admission::Superseded
            }
            None => Admission::Admitted,
        }
    }

    /// Removes `device_id` from the registry, but only if `tx` is still the
    /// registered sender — guards against a just-superseded connection's
    /// cleanup path evicting the connection that replaced it.
    pub fn vacate(&self, device_id: &str, tx: &EndpointTx) {
        self.endpoints.remove_if(device_id, |_, entry| entry.tx.same_channel(tx));
    }

    pub fn send_to(&self, device_id: &str, signal: ServerSignal) -> bool {
        match self.endpoints.get(device_id) {
            Some(entry) => entry.tx.send(EndpointEvent::Message(signal)).is_ok(),
            None => false,
        }
    }

    pub fn owner_of(&self, device_id: &str) -> Option<i64> {
        self.endpoints.get(device_id).map(|e| e.user_id)
    }

    pub fn is_connected(&self, device_id: &str) -> bool {
        self.endpoints.contains_key(device_id)
    }
}
