//! Request/response correlation by a monotonically-increasing 32-bit id.
//!
//! Owned by whichever endpoint issued the request. An entry is released
//! exactly once: by a matching `HTTP_RESPONSE`, by its own timeout, or by
//! [`CorrelationTable::fail_all`] when the transport dies — never more
//! than one of the three.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tunnel_protocol::frame::Frame;

use crate::error::MultiplexError;

pub struct CorrelationTable {
    pending: DashMap<u32, oneshot::Sender<Frame>>,
    next_id: AtomicU32,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            // Request ids start at 1; a transport reset MAY restart the
            // counter, which a fresh `CorrelationTable` naturally does.
            next_id: AtomicU32::new(1),
        }
    }

    pub fn next_request_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers `request_id` as pending and returns the receiver side.
    /// Synchronous and immediate: callers MUST register before writing
    /// the request frame to the transport, or a fast response could
    /// arrive and find nothing to resolve.
    pub fn register(&self, request_id: u32) -> oneshot::Receiver<Frame> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);
        rx
    }

    /// Waits on a receiver from [`register`](Self::register), removing
    /// the entry on timeout so a late response is treated as unknown.
    pub async fn wait(&self, request_id: u32, rx: oneshot::Receiver<Frame>, timeout: Duration) -> Result<Frame, MultiplexError> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(_)) => Err(MultiplexError::ConnectionClosed),
            Err(_) => {
                self.pending.remove(&request_id);
                Err(MultiplexError::RequestTimeout)
            }
        }
    }

    /// Convenience wrapper for callers that can register and send
    /// atomically (no suspension between the two). Prefer
    /// [`register`](Self::register) + [`wait`](Self::wait) when a send
    /// must happen in between.
    pub async fn await_response(&self, request_id: u32, timeout: Duration) -> Result<Frame, MultiplexError> {
        let rx = self.register(request_id);
        self.wait(request_id, rx, timeout).await
    }

    /// Routes an `HTTP_RESPONSE` frame to its pending entry, if any.
    /// Returns `false` for an unknown request id, which the caller logs
    /// and drops rather than treating as an error.
    pub fn resolve(&self, request_id: u32, frame: Frame) -> bool {
        match self.pending.remove(&request_id) {
            Some((_, tx)) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Fails every still-pending entry with `ConnectionClosed`, used when
    /// the underlying transport goes down. Dropping each sender is
    /// sufficient: the paired receiver observes a closed channel.
    pub fn fail_all(&self) {
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tunnel_protocol::frame::Headers;

    fn response(request_id: u32) -> Frame {
        Frame::HttpResponse {
            request_id,
            status_code: 200,
            headers: Headers::new(),
            body: vec![],
        }
    }

    #[tokio::test]
    async fn resolves_a_pending_request_with_its_matching_response() {
        let table = CorrelationTable::new();
        let id = table.next_request_id();
        let table = std::sync::Arc::new(table);
        let table2 = table.clone();
        let handle = tokio::spawn(async move { table2.await_response(id, Duration::from_secs(1)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(table.resolve(id, response(id)));

        let result = handle.await.unwrap();
        assert!(matches!(result, Ok(Frame::HttpResponse { request_id, .. }) if request_id == id));
    }

    #[tokio::test]
    async fn unknown_request_id_is_reported_as_not_resolved() {
        let table = CorrelationTable::new();
        assert!(!table.resolve(999, response(999)));
    }

    #[tokio::test]
    async fn times_out_and_removes_the_entry() {
        let table = CorrelationTable::new();
        let id = table.next_request_id();
        let result = table.await_response(id, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(MultiplexError::RequestTimeout)));
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn fail_all_resolves_pending_waiters_as_connection_closed() {
        let table = std::sync::Arc::new(CorrelationTable::new());
        let id = table.next_request_id();
        let table2 = table.clone();
        let handle = tokio::spawn(async move { table2.await_response(id, Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        table.fail_all();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(MultiplexError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn request_ids_increase_monotonically() {
        let table = CorrelationTable::new();
        let a = table.next_request_id();
        let b = table.next_request_id();
        assert!(b > a);
    }
}
