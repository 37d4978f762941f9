//! Browser endpoint library: drives the `p2p-direct`/`relay` fallback
//! state machine against a target host device and exposes `fetch`/
//! `websocket` over whichever transport wins, via an explicit client
//! handle rather than a monkey-patched platform global.

pub mod client;
pub mod config;

pub use client::{ClientError, TunnelClient};
pub use config::Config;
