//! Error taxonomy for the multiplexer layer.

#[derive(Debug, thiserror::Error, Clone)]
pub enum MultiplexError {
    #[error("request timed out waiting for a response")]
    RequestTimeout,
    #[error("the underlying transport closed before this operation completed")]
    ConnectionClosed,
    #[error("frame codec error: {0}")]
    Codec(String),
    #[error("local dispatch failed: {0}")]
    DispatchFailed(String),
}
