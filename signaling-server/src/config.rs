//! Environment-derived configuration.
//!
//! The JWT secret is a deployment invariant, not a compiled-in constant:
//! it must be set identically on the signaling and relay services, or
//! tokens minted by one will be rejected by the other.

use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub cors_origins: Vec<String>,
    /// Relay URL advertised to browsers when a fallback is negotiated.
    pub relay_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        let token_ttl_secs: u64 = env::var("TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24 * 60 * 60);

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:7080".into()),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            token_ttl: Duration::from_secs(token_ttl_secs),
            cors_origins,
            relay_url: env::var("RELAY_URL").unwrap_or_else(|_| "ws://127.0.0.1:7081".into()),
        }
    }
}
