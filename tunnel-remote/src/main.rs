//! Demo binary exercising [`tunnel_remote::TunnelClient`] against a
//! running host device: issues a single GET against the tunneled
//! service and prints the response.

use tunnel_remote::{Config, TunnelClient};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunnel_remote=info".into()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(device_id = %config.device_id, target = %config.target_device_id, "connecting");

    let client = TunnelClient::connect(&config)
        .await
        .expect("failed to establish tunnel to target device");

    match client.fetch("GET", "/", Default::default(), Vec::new(), None).await {
        Ok(response) => {
            tracing::info!(status = response.status_code, bytes = response.body.len(), "fetch complete");
        }
        Err(e) => tracing::error!(error = %e, "fetch failed"),
    }
}
