//! Authenticates users, registers devices, and relays WebRTC signaling and
//! connect/fallback control messages between two endpoints owned by the
//! same user.
//!
//! ## Modules
//!
//! - [`config`] — environment-derived configuration
//! - [`state`]  — shared pool handle and endpoint-session registry
//! - [`repo`]   — persistence for users and devices
//! - [`routes`] — REST handlers (`/auth`, `/devices`)
//! - [`ws`]     — the `/signal` signaling WebSocket
//! - [`error`]  — HTTP error taxonomy
//! - [`passwords`] — password hashing

pub mod auth_extractor;
pub mod config;
pub mod error;
pub mod passwords;
pub mod repo;
pub mod routes;
pub mod state;
pub mod ws;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Builds the full router, ready to serve once wrapped with a listener.
pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<axum::http::HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    };

    Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/devices/register", post(routes::devices::register_device))
        .route("/devices/", get(routes::devices::list_devices))
        .route("/signal", get(ws::signal_handler))
        .layer(cors)
        .with_state(state)
}
