//! Relay session registry.
//!
//! A session is identified by an opaque, owner-chosen id and holds at most
//! two parties. Admission, forwarding, and close all go through [`AppState`]
//! so the "test slot and assign" critical section is a single atomic
//! [`DashMap`] entry operation, never a separate check-then-insert.

use crate::config::Config;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// An item pushed onto a party's outbound queue.
pub enum RelayEvent {
    Data(Vec<u8>),
    /// The peer closed (or was evicted); this party should close too.
    PeerClosed,
}

pub type PartyTx = mpsc::Sender<RelayEvent>;

/// Which of the two slots a connection occupies in its session.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Party {
    A,
    B,
}

struct Session {
    a: Option<PartyTx>,
    b: Option<PartyTx>,
    started_at: Instant,
    bytes_a_to_b: AtomicU64,
    bytes_b_to_a: AtomicU64,
}

impl Session {
    fn new() -> Self {
        Self {
            a: None,
            b: None,
            started_at: Instant::now(),
            bytes_a_to_b: AtomicU64::new(0),
            bytes_b_to_a: AtomicU64::new(0),
        }
    }

    fn is_full(&self) -> bool {
        self.a.is_some() && self.b.is_some()
    }
}

pub enum Admission {
    Admitted(Party),
    SessionFull,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    sessions: Arc<DashMap<String, Session>>,
}

/// A closed session's metering record.
pub struct ClosedSession {
    pub session_id: String,
    pub duration_secs: f64,
    pub bytes_a_to_b: u64,
    pub bytes_b_to_a: u64,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Atomically tries to occupy a slot in `session_id`. The whole
    /// check-and-assign runs under the shard lock `entry()` holds, so two
    /// simultaneous admits to an empty session always resolve to one `A`
    /// and one `B`, and a third is always rejected.
    pub fn admit(&self, session_id: &str, tx: PartyTx) -> Admission {
        if !self.sessions.contains_key(session_id) && self.sessions.len() >= self.config.max_sessions {
            return Admission::SessionFull;
        }
        match self.sessions.entry(session_id.to_string()) {
            Entry::Vacant(e) => {
                let mut session = Session::new();
                session.a = Some(tx);
                e.insert(session);
                Admission::Admitted(Party::A)
            }
            Entry::Occupied(mut e) => {
                let session = e.get_mut();
                if session.is_full() {
                    Admission::SessionFull
                } else if session.a.is_none() {
                    session.a = Some(tx);
                    Admission::Admitted(Party::A)
                } else {
                    session.b = Some(tx);
                    Admission::Admitted(Party::B)
                }
            }
        }
    }

    /// Forwards `bytes` to the other party in `session_id`, if present.
    /// Applies back-pressure by awaiting the bounded channel send, which
    /// blocks this party's read loop rather than buffering without limit.
    pub async fn forward(&self, session_id: &str, from: Party, bytes: Vec<u8>) {
        let peer_tx = {
            let session = match self.sessions.get(session_id) {
                Some(s) => s,
                None => return,
            };
            let len = bytes.len() as u64;
            match from {
                Party::A => session.bytes_a_to_b.fetch_add(len, Ordering::Relaxed),
                Party::B => session.bytes_b_to_a.fetch_add(len, Ordering::Relaxed),
            };
            match from {
                Party::A => session.b.clone(),
                Party::B => session.a.clone(),
            }
        };
        if let Some(tx) = peer_tx {
            let _ = tx.send(RelayEvent::Data(bytes)).await;
        }
    }

    /// Removes `session_id` entirely, notifying the remaining peer (if any)
    /// that it should close, and returning the metering record.
    pub fn close(&self, session_id: &str, from: Party) -> Option<ClosedSession> {
        let (_, session) = self.sessions.remove(session_id)?;
        let peer = match from {
            Party::A => session.b,
            Party::B => session.a,
        };
        if let Some(tx) = peer {
            let _ = tx.try_send(RelayEvent::PeerClosed);
        }
        Some(ClosedSession {
            session_id: session_id.to_string(),
            duration_secs: session.started_at.elapsed().as_secs_f64(),
            bytes_a_to_b: session.bytes_a_to_b.load(Ordering::Relaxed),
            bytes_b_to_a: session.bytes_b_to_a.load(Ordering::Relaxed),
        })
    }

    pub fn has_peer(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .map(|s| s.is_full())
            .unwrap_or(false)
    }
}
