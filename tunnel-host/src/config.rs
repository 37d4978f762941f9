//! Environment-derived configuration for the host endpoint binary.

use std::time::Duration;

pub struct Config {
    pub signaling_url: String,
    pub relay_url: String,
    pub device_id: String,
    pub pubkey: String,
    pub access_token: String,
    pub local_base_url: String,
    pub max_ws_connections: usize,
    pub reconnect_delay: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let device_id = std::env::var("TUNNEL_DEVICE_ID").unwrap_or_else(|_| "host-default".into());
        if !device_id.starts_with(tunnel_protocol::device::HOST_DEVICE_PREFIX) {
            tracing::warn!(device_id, "TUNNEL_DEVICE_ID does not use the host- prefix");
        }
        Self {
            // HTTP(S) base; signaling_client derives the ws(s) variant.
            signaling_url: std::env::var("TUNNEL_SIGNALING_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".into()),
            relay_url: std::env::var("TUNNEL_RELAY_URL").unwrap_or_else(|_| "ws://127.0.0.1:8081".into()),
            device_id,
            pubkey: std::env::var("TUNNEL_PUBKEY").unwrap_or_else(|_| "unset".into()),
            access_token: std::env::var("TUNNEL_ACCESS_TOKEN").expect("TUNNEL_ACCESS_TOKEN must be set"),
            local_base_url: std::env::var("TUNNEL_LOCAL_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:11434".into()),
            max_ws_connections: std::env::var("TUNNEL_MAX_WS_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(32),
            reconnect_delay: Duration::from_secs(3),
        }
    }
}
