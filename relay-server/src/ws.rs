//! `GET /relay/{session_id}?token=` — the relay WebSocket.
//!
//! Admits up to two parties per session id and forwards binary frames
//! verbatim between them. Runs a single `tokio::select!` loop per
//! connection so reads, writes, heartbeat ticks, and the half-open
//! timeout are all serviced without extra synchronization.

use crate::config::Config;
use crate::heartbeat::ActivityTracker;
use crate::metering;
use crate::state::{Admission, AppState, Party, RelayEvent};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tunnel_protocol::auth::verify_token;

#[derive(Deserialize)]
pub struct RelayQuery {
    token: String,
}

pub async fn relay_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<RelayQuery>,
) -> impl IntoResponse {
    if verify_token(&state.config.jwt_secret, &query.token).is_err() {
        return axum::http::StatusCode::UNAUTHORIZED.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<RelayEvent>(64);

    let party = match state.admit(&session_id, tx) {
        Admission::Admitted(party) => party,
        Admission::SessionFull => {
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: 1013,
                    reason: "session full".into(),
                })))
                .await;
            return;
        }
    };
    info!(session_id = %session_id, "relay party admitted");

    let config: &Config = &state.config;
    let activity = ActivityTracker::new();
    activity.touch();

    let mut heartbeat_tick = tokio::time::interval(config.heartbeat_interval);
    heartbeat_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let half_open_deadline = tokio::time::sleep(config.half_open_timeout);
    tokio::pin!(half_open_deadline);
    let mut half_open_armed = !state.has_peer(&session_id);

    loop {
        tokio::select! {
            maybe_msg = stream.next() => {
                match maybe_msg {
                    Some(Ok(Message::Binary(bytes))) => {
                        if bytes.len() > state.config.max_message_bytes {
                            warn!(session_id = %session_id, "closing: oversize relay frame");
                            break;
                        }
                        activity.touch();
                        state.forward(&session_id, party, bytes.to_vec()).await;
                    }
                    Some(Ok(Message::Text(_))) => {
                        // Text frames are logged and otherwise ignored in this revision.
                        activity.touch();
                    }
                    Some(Ok(Message::Pong(_))) => activity.touch(),
                    Some(Ok(Message::Ping(payload))) => {
                        activity.touch();
                        if sink.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        warn!(session_id = %session_id, error = %err, "relay read error");
                        break;
                    }
                }
            }
            event = rx.recv() => {
                match event {
                    Some(RelayEvent::Data(bytes)) => {
                        if sink.send(Message::Binary(bytes.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(RelayEvent::PeerClosed) | None => break,
                }
            }
            _ = heartbeat_tick.tick() => {
                if activity.is_stale(config.heartbeat_timeout) {
                    warn!(session_id = %session_id, "closing: missed heartbeat");
                    break;
                }
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            _ = &mut half_open_deadline, if half_open_armed => {
                if state.has_peer(&session_id) {
                    half_open_armed = false;
                } else {
                    warn!(session_id = %session_id, "closing: half-open session timed out");
                    break;
                }
            }
        }
    }

    if let Some(closed) = state.close(&session_id, party) {
        metering::record_close(closed);
    }
}
