//! Forwards opaque binary frames between two endpoints pinned to a common
//! session id, used when direct peer-to-peer transport fails.
//!
//! ## Modules
//!
//! - [`config`]    — environment-derived configuration
//! - [`state`]     — the relay-session registry and atomic admission logic
//! - [`ws`]        — the `/relay/{session_id}` WebSocket
//! - [`heartbeat`] — per-connection activity tracking
//! - [`metering`]  — structured close records

pub mod config;
pub mod heartbeat;
pub mod metering;
pub mod state;
pub mod ws;

pub use state::AppState;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

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
        .route("/relay/{session_id}", get(ws::relay_handler))
        .layer(cors)
        .with_state(state)
}
