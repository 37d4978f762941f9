//! `GET /signal?token=&device_id=` — the signaling WebSocket.
//!
//! Authenticates the upgrade, admits the endpoint into the registry
//! (superseding any prior connection for the same device id), then
//! relays routed frames to whichever other device the sender names,
//! enforcing same-owner routing and the 64 KiB message cap.

use crate::repo::devices;
use crate::state::{AppState, EndpointEvent};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tunnel_protocol::auth::verify_token;
use tunnel_protocol::signaling::{ClientSignal, ServerSignal, MAX_SIGNAL_MESSAGE_BYTES};

#[derive(Deserialize)]
pub struct SignalQuery {
    token: String,
    device_id: String,
}

pub async fn signal_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<SignalQuery>,
) -> impl IntoResponse {
    let claims = match verify_token(&state.config.jwt_secret, &query.token) {
        Ok(c) => c,
        Err(_) => return axum::http::StatusCode::UNAUTHORIZED.into_response(),
    };

    let owner = match devices::find_owner(&state.pool, &query.device_id).await {
        Ok(owner) => owner,
        Err(err) => {
            tracing::error!(error = %err, "database failure while authenticating signal upgrade");
            return axum::http::StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    match owner {
        Some(owner_id) if owner_id == claims.sub => {}
        _ => return axum::http::StatusCode::UNAUTHORIZED.into_response(),
    }

    let device_id = query.device_id;
    let user_id = claims.sub;
    ws.on_upgrade(move |socket| handle_socket(socket, state, device_id, user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, device_id: String, user_id: i64) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<EndpointEvent>();

    state.admit(&device_id, user_id, tx.clone());
    info!(device_id = %device_id, "signaling endpoint admitted");

    let _ = tx.send(EndpointEvent::Message(ServerSignal::Connected {
        device_id: device_id.clone(),
        message: "connected".into(),
    }));

    let outbound_device_id = device_id.clone();
    let outbound = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                EndpointEvent::Message(signal) => {
                    let text = match serde_json::to_string(&signal) {
                        Ok(t) => t,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize outbound signal");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                EndpointEvent::Close(reason) => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: axum::extract::ws::close_code::NORMAL,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
        info!(device_id = %outbound_device_id, "signaling outbound task exiting");
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                if text.len() > MAX_SIGNAL_MESSAGE_BYTES {
                    warn!(device_id = %device_id, "closing connection: oversize signaling frame");
                    break;
                }
                let signal: ClientSignal = match serde_json::from_str(&text) {
                    Ok(s) => s,
                    Err(err) => {
                        warn!(device_id = %device_id, error = %err, "malformed signaling frame; closing");
                        break;
                    }
                };
                route(&state, &device_id, user_id, signal, &tx);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    outbound.abort();
    state.vacate(&device_id, &tx);
    info!(device_id = %device_id, "signaling endpoint disconnected");
}

fn route(
    state: &AppState,
    sender_device_id: &str,
    sender_user_id: i64,
    signal: ClientSignal,
    sender_tx: &mpsc::UnboundedSender<EndpointEvent>,
) {
    let target_device_id = signal.target_device_id().to_string();

    let target_owner = state.owner_of(&target_device_id);
    match target_owner {
        None => {
            let _ = sender_tx.send(EndpointEvent::Message(ServerSignal::Error {
                message: format!("target device '{target_device_id}' is not connected"),
            }));
            return;
        }
        Some(owner) if owner != sender_user_id => {
            let _ = sender_tx.send(EndpointEvent::Message(ServerSignal::Error {
                message: "target device is not owned by this account".into(),
            }));
            return;
        }
        Some(_) => {}
    }

    let mut relayed = signal.into_relayed(sender_device_id.to_string());
    if let ServerSignal::ConnectRequestReceived { relay_url, preferred_transport, .. } = &mut relayed {
        if matches!(preferred_transport, tunnel_protocol::signaling::PreferredTransport::Relay) {
            *relay_url = Some(state.config.relay_url.clone());
        }
    }
    if state.send_to(&target_device_id, relayed) {
        let _ = sender_tx.send(EndpointEvent::Message(ServerSignal::Ack {
            message: "delivered".into(),
        }));
    } else {
        let _ = sender_tx.send(EndpointEvent::Message(ServerSignal::Error {
            message: format!("failed to deliver to '{target_device_id}'"),
        }));
    }
}
