//! `relay` transport: a WebSocket client to the relay service, bound to
//! a deterministic session id. Used as the fallback when `p2p-direct`
//! fails three times or the platform has no WebRTC capability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::TransportError;
use crate::transport::Transport;

pub struct RelayTransport {
    outbound_tx: mpsc::UnboundedSender<WsMessage>,
    open: Arc<AtomicBool>,
}

/// Dials the relay at `relay_url` for `session_id` and spins up the
/// background task that drains outbound sends and forwards inbound
/// binary frames to the returned channel.
pub async fn connect(
    relay_url: &str,
    session_id: &str,
    token: &str,
) -> Result<(RelayTransport, mpsc::UnboundedReceiver<Vec<u8>>), TransportError> {
    let url = format!("{relay_url}/relay/{session_id}?token={token}");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .map_err(|e| TransportError::RelayFailed(e.to_string()))?;

    let (mut sink, mut stream) = ws_stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let open = Arc::new(AtomicBool::new(true));

    let reader_open = Arc::clone(&open);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                outgoing = outbound_rx.recv() => {
                    match outgoing {
                        Some(msg) => {
                            if sink.send(msg).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Binary(data))) => {
                            let _ = inbound_tx.send(data.to_vec());
                        }
                        Some(Ok(WsMessage::Ping(payload))) => {
                            let _ = sink.send(WsMessage::Pong(payload)).await;
                        }
                        Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
        reader_open.store(false, Ordering::SeqCst);
        let _ = sink.close().await;
    });

    Ok((RelayTransport { outbound_tx, open }, inbound_rx))
}

#[async_trait]
impl Transport for RelayTransport {
    async fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.outbound_tx
            .send(WsMessage::Binary(bytes.into()))
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.outbound_tx.send(WsMessage::Close(None));
    }
}
