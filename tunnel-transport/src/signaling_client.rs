//! Thin client for the signaling WebSocket (`GET /signal?token=&device_id=`),
//! used by the fallback state machine to exchange SDP/ICE and
//! `connect-request`/`connect-ack` frames with the peer device.
//!
//! This connection is independent of the data transport being
//! negotiated: per the fallback state machine, it MUST stay open across
//! `p2p-direct` retries and the switch to `relay`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tunnel_protocol::signaling::{ClientSignal, ServerSignal};

use crate::error::TransportError;

pub struct SignalingClient {
    outbound_tx: mpsc::UnboundedSender<ClientSignal>,
    open: Arc<AtomicBool>,
}

pub async fn connect(
    signaling_url: &str,
    token: &str,
    device_id: &str,
) -> Result<(SignalingClient, mpsc::UnboundedReceiver<ServerSignal>), TransportError> {
    let url = format!("{signaling_url}/signal?token={token}&device_id={device_id}");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .map_err(|e| TransportError::SignalingFailed(e.to_string()))?;

    let (mut sink, mut stream) = ws_stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientSignal>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let open = Arc::new(AtomicBool::new(true));

    let reader_open = Arc::clone(&open);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                outgoing = outbound_rx.recv() => {
                    match outgoing {
                        Some(signal) => {
                            let Ok(text) = serde_json::to_string(&signal) else { continue };
                            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            match serde_json::from_str::<ServerSignal>(&text) {
                                Ok(signal) => {
                                    if inbound_tx.send(signal).is_err() {
                                        break;
                                    }
                                }
                                Err(e) => tracing::warn!(error = %e, "unparseable signaling frame"),
                            }
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

    Ok((SignalingClient { outbound_tx, open }, inbound_rx))
}

impl SignalingClient {
    pub fn send(&self, signal: ClientSignal) -> Result<(), TransportError> {
        self.outbound_tx
            .send(signal)
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
