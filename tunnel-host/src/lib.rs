//! Host endpoint binary: registers itself with the signaling service,
//! then answers whatever transport the browser side proposes, forever,
//! reconnecting on every drop. There is no host-side state machine; the
//! browser drives the `p2p-direct`/`relay` choice, the host just reacts.

pub mod config;
pub mod devices;
pub mod session;
pub mod url;

use std::sync::Arc;

pub use config::Config;

/// Registers the device once, then loops `session::run_session` with a
/// fixed reconnect delay for as long as the process lives.
pub async fn run(config: Config) {
    let config = Arc::new(config);

    if let Err(e) = devices::register(&config.signaling_url, &config.access_token, &config.device_id, &config.pubkey).await {
        tracing::warn!(error = %e, "device registration failed, continuing anyway");
    }

    let signaling_ws_url = url::to_ws(&config.signaling_url);

    loop {
        tracing::info!(device_id = %config.device_id, "connecting to signaling service");
        match session::run_session(Arc::clone(&config), &signaling_ws_url).await {
            Ok(()) => {}
            Err(e) => tracing::warn!(error = %e, "signaling session ended"),
        }
        tokio::time::sleep(config.reconnect_delay).await;
    }
}
