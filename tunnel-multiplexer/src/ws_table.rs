//! WebSocket sub-connection registry, keyed by a 32-bit connection id.
//!
//! Generic over the local handle type each side stores: the host keeps
//! the outbound `mpsc::UnboundedSender` that feeds its real WebSocket
//! connection; the browser keeps the sender that feeds its user-facing
//! surface object. Both sides need the same id-allocation and
//! insert/remove/drain-on-death shape, so it lives here once.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

pub struct WsTable<T> {
    connections: DashMap<u32, T>,
    next_id: AtomicU32,
}

impl<T> Default for WsTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WsTable<T> {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn next_connection_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, connection_id: u32, handle: T) {
        self.connections.insert(connection_id, handle);
    }

    pub fn get(&self, connection_id: u32) -> Option<T>
    where
        T: Clone,
    {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    pub fn remove(&self, connection_id: u32) -> Option<T> {
        self.connections.remove(&connection_id).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Drains every tracked connection, used when the transport dies so
    /// the caller can close each one with a synthetic failure.
    pub fn drain(&self) -> Vec<(u32, T)> {
        let ids: Vec<u32> = self.connections.iter().map(|e| *e.key()).collect();
        ids.into_iter()
            .filter_map(|id| self.connections.remove(&id).map(|(_, v)| (id, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_increasing_connection_ids() {
        let table: WsTable<()> = WsTable::new();
        let a = table.next_connection_id();
        let b = table.next_connection_id();
        assert!(b > a);
    }

    #[test]
    fn drain_empties_the_table_and_returns_everything() {
        let table: WsTable<&str> = WsTable::new();
        table.insert(1, "a");
        table.insert(2, "b");
        let mut drained = table.drain();
        drained.sort_by_key(|(id, _)| *id);
        assert_eq!(drained, vec![(1, "a"), (2, "b")]);
        assert!(table.is_empty());
    }
}
