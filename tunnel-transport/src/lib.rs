//! The ordered byte pipe between two tunnel endpoints.
//!
//! ## Modules
//!
//! - [`transport`]        — the common `Transport` trait both
//!   implementations satisfy
//! - [`p2p`]               — `p2p-direct`: an `RTCPeerConnection` with a
//!   single `http-proxy` data channel
//! - [`relay_transport`]   — `relay`: a WebSocket client to the relay
//!   service
//! - [`signaling_client`]  — the signaling WebSocket client used to
//!   exchange SDP/ICE and connect-request/ack frames
//! - [`fallback`]          — the browser endpoint's fallback state
//!   machine, composing the above into a single `connect()` call
//! - [`error`]             — the transport error taxonomy

pub mod error;
pub mod fallback;
pub mod p2p;
pub mod relay_transport;
pub mod signaling_client;
pub mod transport;

pub use error::TransportError;
pub use transport::{OpenedTransport, Transport};
