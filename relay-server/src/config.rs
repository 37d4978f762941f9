//! Environment-derived configuration. The JWT secret MUST match the
//! signaling service's; see that crate's config module for the same note.

use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub half_open_timeout: Duration,
    pub max_message_bytes: usize,
    pub max_sessions: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:7081".into()),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            cors_origins,
            heartbeat_interval: Duration::from_secs(env_u64("HEARTBEAT_INTERVAL_SECONDS", 20)),
            heartbeat_timeout: Duration::from_secs(env_u64("HEARTBEAT_TIMEOUT_SECONDS", 10)),
            half_open_timeout: Duration::from_secs(env_u64("HALF_OPEN_TIMEOUT_SECONDS", 300)),
            max_message_bytes: env_u64("MAX_MESSAGE_BYTES", 16 * 1024 * 1024) as usize,
            max_sessions: env_u64("MAX_SESSIONS", 10_000) as usize,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
