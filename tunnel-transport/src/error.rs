//! Error taxonomy for the transport layer.

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("signaling connection failed: {0}")]
    SignalingFailed(String),
    #[error("peer connection setup failed: {0}")]
    PeerConnectionFailed(String),
    #[error("relay connection failed: {0}")]
    RelayFailed(String),
    #[error("watchdog expired waiting for {0}")]
    Timeout(&'static str),
    #[error("transport is closed")]
    Closed,
    #[error("send failed: {0}")]
    SendFailed(String),
}
