use tracing::info;

use tunnel_host::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunnel_host=info".into()),
        )
        .init();

    let config = Config::from_env();
    info!(device_id = %config.device_id, signaling_url = %config.signaling_url, "starting host endpoint");

    tokio::select! {
        _ = tunnel_host::run(config) => {}
        _ = shutdown_signal() => {}
    }
    info!("shutdown signal received");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
