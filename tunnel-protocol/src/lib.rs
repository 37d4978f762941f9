//! # Tunnel Protocol
//!
//! The wire formats shared by every other crate in this workspace:
//!
//! - [`frame`] — the binary frame codec multiplexed over a tunnel transport
//!   (HTTP request/response, WebSocket connect/data/close).
//! - [`signaling`] — the JSON message alphabet exchanged over the
//!   signaling WebSocket.
//! - [`auth`] — stateless bearer access tokens, verified identically by
//!   the signaling and relay services.
//! - [`device`] — device id conventions (browser vs. host, relay session
//!   naming).

pub mod auth;
pub mod device;
pub mod frame;
pub mod signaling;
