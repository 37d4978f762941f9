//! The browser side of the multiplexer: a `fetch`-like operation backed
//! by request correlation, and a `WebSocket`-like factory backed by the
//! sub-connection table, both writing `HTTP_REQUEST` / `WS_CONNECT` /
//! `WS_DATA` / `WS_CLOSE` frames to the transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tunnel_protocol::frame::{self, opcode, Frame, Headers};
use tunnel_transport::Transport;

use crate::control_exclusion::{self, ConnectVia};
use crate::correlation::CorrelationTable;
use crate::error::MultiplexError;
use crate::ws_table::WsTable;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BrowserConfig {
    /// Base URL of the signaling service, used to exempt the control
    /// channel from tunneling in [`BrowserMultiplexer::websocket`].
    pub signaling_base_url: String,
    pub request_timeout: Duration,
}

/// A resolved HTTP response, shaped like the browser's `fetch` result.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// An inbound event on a tunneled WebSocket sub-connection.
#[derive(Debug, Clone)]
pub enum WsEvent {
    Text(String),
    Binary(Vec<u8>),
    Closed { code: u16, reason: String },
}

/// Where [`BrowserMultiplexer::websocket`] decided to connect. Control
/// channel URLs are handed back as `Direct` so the caller dials them
/// itself, outside the tunnel.
pub enum BrowserWebSocketHandle {
    Tunneled(BrowserWebSocket),
    Direct { url: String },
}

pub struct BrowserWebSocket {
    connection_id: u32,
    transport: Arc<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<WsEvent>,
}

impl BrowserWebSocket {
    pub async fn send_text(&self, text: String) -> Result<(), MultiplexError> {
        let frame = Frame::WsData {
            connection_id: self.connection_id,
            opcode: opcode::TEXT,
            payload: text.into_bytes(),
        };
        self.transport
            .send(frame::encode(&frame))
            .await
            .map_err(|e| MultiplexError::DispatchFailed(e.to_string()))
    }

    pub async fn send_binary(&self, data: Vec<u8>) -> Result<(), MultiplexError> {
        let frame = Frame::WsData {
            connection_id: self.connection_id,
            opcode: opcode::BINARY,
            payload: data,
        };
        self.transport
            .send(frame::encode(&frame))
            .await
            .map_err(|e| MultiplexError::DispatchFailed(e.to_string()))
    }

    pub async fn close(&self, code: u16, reason: String) -> Result<(), MultiplexError> {
        let frame = Frame::WsClose {
            connection_id: self.connection_id,
            close_code: code,
            reason,
        };
        self.transport
            .send(frame::encode(&frame))
            .await
            .map_err(|e| MultiplexError::DispatchFailed(e.to_string()))
    }
}

pub struct BrowserMultiplexer {
    transport: Arc<dyn Transport>,
    config: BrowserConfig,
    correlation: CorrelationTable,
    ws_connections: WsTable<mpsc::UnboundedSender<WsEvent>>,
}

impl BrowserMultiplexer {
    pub fn new(transport: Arc<dyn Transport>, config: BrowserConfig) -> Self {
        Self {
            transport,
            config,
            correlation: CorrelationTable::new(),
            ws_connections: WsTable::new(),
        }
    }

    /// Consumes the transport's inbound channel until it closes, routing
    /// `HTTP_RESPONSE` frames to pending `fetch` calls and `WS_DATA` /
    /// `WS_CLOSE` frames to open sub-connections. Returns once the
    /// transport dies, having failed every pending request and closed
    /// every sub-connection first.
    pub async fn run(&self, mut inbound: mpsc::UnboundedReceiver<Vec<u8>>) {
        while let Some(bytes) = inbound.recv().await {
            match frame::decode(&bytes) {
                Ok(Frame::HttpResponse { request_id, status_code, headers, body }) => {
                    if !self.correlation.resolve(
                        request_id,
                        Frame::HttpResponse { request_id, status_code, headers, body },
                    ) {
                        tracing::debug!(request_id, "http response for unknown or expired request dropped");
                    }
                }
                Ok(Frame::WsData { connection_id, opcode, payload }) => {
                    self.deliver_ws_data(connection_id, opcode, payload);
                }
                Ok(Frame::WsClose { connection_id, close_code, reason }) => {
                    if let Some(tx) = self.ws_connections.remove(connection_id) {
                        let _ = tx.send(WsEvent::Closed { code: close_code, reason });
                    }
                }
                Ok(other) => {
                    tracing::debug!(frame_type = ?frame::frame_type(&other), "browser ignoring frame type it never receives");
                }
                Err(e) => tracing::warn!(error = %e, "dropping undecodable frame"),
            }
        }

        self.correlation.fail_all();
        for (connection_id, tx) in self.ws_connections.drain() {
            tracing::debug!(connection_id, "closing ws sub-connection on transport death");
            let _ = tx.send(WsEvent::Closed { code: 1006, reason: "transport closed".into() });
        }
    }

    fn deliver_ws_data(&self, connection_id: u32, opcode: u8, payload: Vec<u8>) {
        let Some(tx) = self.ws_connections.get(connection_id) else {
            tracing::debug!(connection_id, "ws data for unknown sub-connection dropped");
            return;
        };
        let event = match opcode {
            opcode::TEXT => String::from_utf8(payload).ok().map(WsEvent::Text),
            opcode::BINARY => Some(WsEvent::Binary(payload)),
            _ => None,
        };
        if let Some(event) = event {
            let _ = tx.send(event);
        }
    }

    /// Issues an HTTP request over the tunnel and awaits its response.
    /// `timeout` overrides [`BrowserConfig::request_timeout`] when `Some`.
    pub async fn fetch(
        &self,
        method: &str,
        path_with_query: &str,
        headers: Headers,
        body: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<ProxyResponse, MultiplexError> {
        let request_id = self.correlation.next_request_id();
        let rx = self.correlation.register(request_id);

        let frame = Frame::HttpRequest {
            request_id,
            method: method.to_string(),
            path: path_with_query.to_string(),
            headers,
            body,
        };
        self.transport
            .send(frame::encode(&frame))
            .await
            .map_err(|e| MultiplexError::DispatchFailed(e.to_string()))?;

        let timeout = timeout.unwrap_or(self.config.request_timeout);
        match self.correlation.wait(request_id, rx, timeout).await? {
            Frame::HttpResponse { status_code, headers, body, .. } => Ok(ProxyResponse { status_code, headers, body }),
            _ => unreachable!("correlation table only ever resolves with HttpResponse frames"),
        }
    }

    /// Opens a WebSocket, transparently excluding the signaling control
    /// channel from tunneling (see [`control_exclusion`]).
    pub async fn websocket(&self, url: &str, headers: Headers) -> Result<BrowserWebSocketHandle, MultiplexError> {
        match control_exclusion::classify(url, &self.config.signaling_base_url) {
            ConnectVia::Direct => Ok(BrowserWebSocketHandle::Direct { url: url.to_string() }),
            ConnectVia::Tunneled => {
                let connection_id = self.ws_connections.next_connection_id();
                let (tx, rx) = mpsc::unbounded_channel();
                self.ws_connections.insert(connection_id, tx);

                let frame = Frame::WsConnect {
                    connection_id,
                    url: url.to_string(),
                    headers,
                };
                self.transport
                    .send(frame::encode(&frame))
                    .await
                    .map_err(|e| MultiplexError::DispatchFailed(e.to_string()))?;

                Ok(BrowserWebSocketHandle::Tunneled(BrowserWebSocket {
                    connection_id,
                    transport: Arc::clone(&self.transport),
                    events: rx,
                }))
            }
        }
    }
}
