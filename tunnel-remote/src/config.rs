//! Environment-derived configuration for the browser-side demo binary.
//! A real browser build gets these values from its own runtime instead
//! of the process environment; this binary exists to exercise the same
//! library a browser host would embed.

use std::time::Duration;

use tunnel_protocol::device::BROWSER_DEVICE_PREFIX;

pub struct Config {
    /// HTTP(S) base of the signaling service, also used to exempt the
    /// control channel from tunneling.
    pub signaling_url: String,
    pub relay_url: String,
    /// Ephemeral id for this browser instance, generated fresh per run.
    pub device_id: String,
    pub access_token: String,
    pub target_device_id: String,
    pub ice_servers: Vec<String>,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            signaling_url: std::env::var("TUNNEL_SIGNALING_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".into()),
            relay_url: std::env::var("TUNNEL_RELAY_URL").unwrap_or_else(|_| "ws://127.0.0.1:8081".into()),
            device_id: format!("{BROWSER_DEVICE_PREFIX}{}", uuid::Uuid::new_v4()),
            access_token: std::env::var("TUNNEL_ACCESS_TOKEN").expect("TUNNEL_ACCESS_TOKEN must be set"),
            target_device_id: std::env::var("TUNNEL_TARGET_DEVICE_ID").expect("TUNNEL_TARGET_DEVICE_ID must be set"),
            ice_servers: std::env::var("TUNNEL_ICE_SERVERS")
                .map(|v| v.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}
