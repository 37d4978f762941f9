//! The common interface shared by the two transport implementations.
//!
//! The wire description of this interface is callback-shaped
//! (`send`/`on_receive`/`is_open`/`close`); a callback registered after
//! construction is a poor fit for Rust's ownership model, since the
//! handler would need to be installed before the first inbound frame can
//! race it in. Instead, [`Transport::open`] returns the inbound stream as
//! an owned channel receiver up front, alongside the handle used to send
//! and close. Both implementations still expose the same four
//! operations; only the delivery mechanism for `on_receive` changes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// A live ordered byte pipe between this endpoint and its peer.
///
/// `bytes` handed to [`send`](Transport::send) and produced on the
/// receive channel are opaque to the transport: framing and
/// multiplexing are the concern of the layer above.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError>;
    fn is_open(&self) -> bool;
    async fn close(&self);
}

/// Returned by a transport constructor: the handle plus the channel
/// carrying every inbound frame in receipt order. The channel closes
/// (the receiver yields `None`) when the transport goes down for any
/// reason, which is how callers above this layer learn to run their
/// `ConnectionClosed` cancellation path.
pub struct OpenedTransport {
    pub handle: Box<dyn Transport>,
    pub inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}
