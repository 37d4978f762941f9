//! Explicit factory for the browser-side tunnel. Per the exclusion this
//! workspace makes from the source's global-monkey-patch style (see
//! [`tunnel_multiplexer::control_exclusion`]), nothing here replaces a
//! platform global; callers get a handle and call methods on it.

use std::sync::Arc;
use std::time::Duration;

use tunnel_multiplexer::browser::{BrowserConfig, BrowserMultiplexer, BrowserWebSocketHandle, ProxyResponse};
use tunnel_multiplexer::MultiplexError;
use tunnel_protocol::frame::Headers;
use tunnel_transport::fallback::{self, FallbackConfig};
use tunnel_transport::signaling_client::{self, SignalingClient};
use tunnel_transport::{Transport, TransportError};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Multiplex(#[from] MultiplexError),
}

/// A connected tunnel to a single host device. Holds the signaling
/// connection open for the lifetime of the tunnel, in case the fallback
/// layer ever needs it again (e.g. to renegotiate after a relay drop in
/// a future revision); the current implementation does not renegotiate.
pub struct TunnelClient {
    mux: Arc<BrowserMultiplexer>,
    _signaling: SignalingClient,
}

impl TunnelClient {
    /// Connects to `config.target_device_id`, running the full
    /// `p2p-direct` / `relay` fallback state machine before returning.
    pub async fn connect(config: &Config) -> Result<Self, ClientError> {
        let signaling_ws_url = to_ws(&config.signaling_url);
        let (signaling, mut signaling_inbound) =
            signaling_client::connect(&signaling_ws_url, &config.access_token, &config.device_id).await?;

        let fallback_config = FallbackConfig {
            ice_servers: config.ice_servers.clone(),
            relay_url: config.relay_url.clone(),
            ..Default::default()
        };

        let opened = fallback::connect(
            &signaling,
            &mut signaling_inbound,
            &config.device_id,
            &config.target_device_id,
            &config.access_token,
            &fallback_config,
        )
        .await?;

        let transport: Arc<dyn Transport> = Arc::from(opened.handle);
        let mux = Arc::new(BrowserMultiplexer::new(
            transport,
            BrowserConfig {
                signaling_base_url: config.signaling_url.clone(),
                request_timeout: config.request_timeout,
            },
        ));

        let run_mux = Arc::clone(&mux);
        tokio::spawn(async move { run_mux.run(opened.inbound).await });

        // Keeps the signaling connection's background task alive without
        // acting on anything further it reports.
        tokio::spawn(async move { while signaling_inbound.recv().await.is_some() {} });

        Ok(Self { mux, _signaling: signaling })
    }

    pub async fn fetch(
        &self,
        method: &str,
        path_with_query: &str,
        headers: Headers,
        body: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<ProxyResponse, MultiplexError> {
        self.mux.fetch(method, path_with_query, headers, body, timeout).await
    }

    pub async fn websocket(&self, url: &str, headers: Headers) -> Result<BrowserWebSocketHandle, MultiplexError> {
        self.mux.websocket(url, headers).await
    }
}

fn to_ws(http_url: &str) -> String {
    if let Some(rest) = http_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = http_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        http_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_http_schemes_to_ws() {
        assert_eq!(to_ws("http://localhost:8080"), "ws://localhost:8080");
        assert_eq!(to_ws("https://tunnel.example.com"), "wss://tunnel.example.com");
    }
}
