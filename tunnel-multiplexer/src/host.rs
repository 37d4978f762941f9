//! The host side of the multiplexer: reconstructs `HTTP_REQUEST` frames
//! into real requests against a local service, and `WS_CONNECT` frames
//! into real outbound WebSocket connections, mirroring traffic back
//! across the tunnel as `HTTP_RESPONSE` / `WS_DATA` / `WS_CLOSE` frames.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tunnel_protocol::frame::{self, opcode, Frame, Headers};
use tunnel_transport::Transport;

use crate::ws_table::WsTable;

pub struct HostConfig {
    /// Base URL of the local service HTTP_REQUEST frames are replayed
    /// against, e.g. `http://127.0.0.1:11434`.
    pub local_base_url: String,
    /// Caps concurrent outbound WebSocket sub-connections per transport.
    pub max_ws_connections: usize,
}

pub struct HostMultiplexer {
    transport: Arc<dyn Transport>,
    config: HostConfig,
    http_client: reqwest::Client,
    ws_connections: WsTable<mpsc::UnboundedSender<WsMessage>>,
    ws_count: AtomicUsize,
}

impl HostMultiplexer {
    pub fn new(transport: Arc<dyn Transport>, config: HostConfig) -> Self {
        Self {
            transport,
            config,
            http_client: reqwest::Client::new(),
            ws_connections: WsTable::new(),
            ws_count: AtomicUsize::new(0),
        }
    }

    /// Consumes the transport's inbound channel until it closes, which
    /// happens exactly once, when the transport dies for any reason.
    pub async fn run(&self, mut inbound: mpsc::UnboundedReceiver<Vec<u8>>) {
        while let Some(bytes) = inbound.recv().await {
            match frame::decode(&bytes) {
                Ok(Frame::HttpRequest { request_id, method, path, headers, body }) => {
                    self.handle_http_request(request_id, method, path, headers, body).await;
                }
                Ok(Frame::WsConnect { connection_id, url, headers }) => {
                    self.handle_ws_connect(connection_id, url, headers).await;
                }
                Ok(Frame::WsData { connection_id, opcode, payload }) => {
                    self.route_ws_data(connection_id, opcode, payload).await;
                }
                Ok(Frame::WsClose { connection_id, close_code, reason }) => {
                    self.route_ws_close(connection_id, close_code, reason).await;
                }
                Ok(other) => {
                    tracing::debug!(frame_type = ?frame::frame_type(&other), "host ignoring frame type it never receives");
                }
                Err(e) => tracing::warn!(error = %e, "dropping undecodable frame"),
            }
        }

        for (connection_id, tx) in self.ws_connections.drain() {
            tracing::debug!(connection_id, "closing ws sub-connection on transport death");
            drop(tx);
        }
        self.ws_count.store(0, Ordering::SeqCst);
    }

    async fn send_frame(&self, frame: Frame) {
        if let Err(e) = self.transport.send(frame::encode(&frame)).await {
            tracing::warn!(error = %e, "failed to send frame back across transport");
        }
    }

    async fn handle_http_request(&self, request_id: u32, method: String, path: String, headers: Headers, body: Vec<u8>) {
        let url = format!("{}{}", self.config.local_base_url, path);
        let method = match reqwest::Method::from_bytes(method.as_bytes()) {
            Ok(m) => m,
            Err(_) => {
                self.send_frame(error_response(request_id, "invalid method")).await;
                return;
            }
        };

        let mut header_map = HeaderMap::new();
        for (name, value) in &headers {
            if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                header_map.insert(name, value);
            }
        }

        let response = self
            .http_client
            .request(method, &url)
            .headers(header_map)
            .body(body)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status_code = resp.status().as_u16();
                let mut out_headers = Headers::new();
                for (name, value) in resp.headers() {
                    if let Ok(value) = value.to_str() {
                        out_headers.insert(name.to_string(), value.to_string());
                    }
                }
                let body = resp.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
                self.send_frame(Frame::HttpResponse {
                    request_id,
                    status_code,
                    headers: out_headers,
                    body,
                })
                .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, url, "local http dispatch failed");
                self.send_frame(error_response(request_id, "local service unreachable")).await;
            }
        }
    }

    async fn handle_ws_connect(&self, connection_id: u32, url: String, headers: Headers) {
        if self.ws_count.load(Ordering::SeqCst) >= self.config.max_ws_connections {
            tracing::warn!(connection_id, "ws sub-connection cap reached");
            self.send_frame(abnormal_close(connection_id)).await;
            return;
        }

        let mut request = match tokio_tungstenite::tungstenite::client::IntoClientRequest::into_client_request(url.as_str()) {
            Ok(r) => r,
            Err(_) => {
                self.send_frame(abnormal_close(connection_id)).await;
                return;
            }
        };
        for (name, value) in &headers {
            if let (Ok(name), Ok(value)) = (
                tokio_tungstenite::tungstenite::http::HeaderName::from_bytes(name.as_bytes()),
                tokio_tungstenite::tungstenite::http::HeaderValue::from_str(value),
            ) {
                request.headers_mut().insert(name, value);
            }
        }

        let (ws_stream, _) = match tokio_tungstenite::connect_async(request).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, connection_id, "outbound ws connect failed");
                self.send_frame(abnormal_close(connection_id)).await;
                return;
            }
        };

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();
        self.ws_connections.insert(connection_id, outbound_tx);
        self.ws_count.fetch_add(1, Ordering::SeqCst);

        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let (mut sink, mut stream) = ws_stream.split();
            loop {
                tokio::select! {
                    outgoing = outbound_rx.recv() => {
                        match outgoing {
                            Some(msg) => {
                                let is_close = matches!(msg, WsMessage::Close(_));
                                if sink.send(msg).await.is_err() || is_close {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    incoming = stream.next() => {
                        match incoming {
                            Some(Ok(WsMessage::Text(text))) => {
                                let frame = Frame::WsData { connection_id, opcode: opcode::TEXT, payload: text.as_bytes().to_vec() };
                                let _ = transport.send(frame::encode(&frame)).await;
                            }
                            Some(Ok(WsMessage::Binary(data))) => {
                                let frame = Frame::WsData { connection_id, opcode: opcode::BINARY, payload: data.to_vec() };
                                let _ = transport.send(frame::encode(&frame)).await;
                            }
                            Some(Ok(WsMessage::Close(frame))) => {
                                let (code, reason) = frame
                                    .map(|f| (f.code.into(), f.reason.to_string()))
                                    .unwrap_or((1000, String::new()));
                                let close = Frame::WsClose { connection_id, close_code: code, reason };
                                let _ = transport.send(frame::encode(&close)).await;
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(_)) | None => {
                                let close = Frame::WsClose { connection_id, close_code: 1006, reason: "abnormal".into() };
                                let _ = transport.send(frame::encode(&close)).await;
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    async fn route_ws_data(&self, connection_id: u32, opcode: u8, payload: Vec<u8>) {
        let Some(tx) = self.ws_connections.get(connection_id) else {
            tracing::debug!(connection_id, "ws data for unknown sub-connection dropped");
            return;
        };
        let msg = match opcode {
            opcode::TEXT => String::from_utf8(payload).ok().map(WsMessage::from),
            opcode::BINARY => Some(WsMessage::Binary(payload.into())),
            _ => None,
        };
        if let Some(msg) = msg {
            let _ = tx.send(msg);
        }
    }

    async fn route_ws_close(&self, connection_id: u32, close_code: u16, reason: String) {
        if let Some(tx) = self.ws_connections.remove(connection_id) {
            self.ws_count.fetch_sub(1, Ordering::SeqCst);
            let frame = tokio_tungstenite::tungstenite::protocol::CloseFrame {
                code: close_code.into(),
                reason: reason.into(),
            };
            let _ = tx.send(WsMessage::Close(Some(frame)));
        }
    }
}

fn error_response(request_id: u32, message: &str) -> Frame {
    Frame::HttpResponse {
        request_id,
        status_code: 502,
        headers: Headers::new(),
        body: message.as_bytes().to_vec(),
    }
}

fn abnormal_close(connection_id: u32) -> Frame {
    Frame::WsClose {
        connection_id,
        close_code: 1006,
        reason: "abnormal".into(),
    }
}
