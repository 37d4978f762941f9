//! The host's half of the fallback state machine: purely reactive. The
//! host never chooses between `p2p-direct` and `relay` and never
//! retries; it answers whatever the browser proposes and reports back
//! over signaling. See `tunnel_transport::fallback` for the browser's
//! (driving) side of the same exchange.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tunnel_multiplexer::host::{HostConfig, HostMultiplexer};
use tunnel_protocol::signaling::{ClientSignal, ConnectStatus, IceCandidatePayload, SdpPayload, ServerSignal};
use tunnel_transport::p2p::{self, IceCandidateIn, PeerState};
use tunnel_transport::relay_transport;
use tunnel_transport::signaling_client::SignalingClient;
use tunnel_transport::Transport;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("signaling connection closed")]
    SignalingClosed,
}

/// Runs one signaling connection's lifetime, answering every offer and
/// relay connect-request it sees until the connection drops. The caller
/// is expected to reconnect and call this again.
pub async fn run_session(config: Arc<Config>, signaling_ws_url: &str) -> Result<(), SessionError> {
    let (signaling, mut inbound) = tunnel_transport::signaling_client::connect(signaling_ws_url, &config.access_token, &config.device_id)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "signaling connect failed");
            SessionError::SignalingClosed
        })?;
    let signaling = Arc::new(signaling);

    // sender_device_id -> forward channel into that offer's in-flight answer task.
    let pending_ice: Arc<DashMap<String, mpsc::UnboundedSender<IceCandidateIn>>> = Arc::new(DashMap::new());

    loop {
        match inbound.recv().await {
            Some(ServerSignal::Connected { device_id, .. }) => {
                tracing::info!(device_id, "signaling session established");
            }
            Some(ServerSignal::Offer { sender_device_id, payload }) => {
                let (ice_tx, ice_rx) = mpsc::unbounded_channel();
                pending_ice.insert(sender_device_id.clone(), ice_tx);
                tokio::spawn(answer_offer(
                    Arc::clone(&config),
                    Arc::clone(&signaling),
                    sender_device_id,
                    payload,
                    ice_rx,
                ));
            }
            Some(ServerSignal::IceCandidate { sender_device_id, payload }) => {
                if let Some(tx) = pending_ice.get(&sender_device_id) {
                    let _ = tx.send(IceCandidateIn {
                        candidate: payload.candidate,
                        sdp_mid: payload.sdp_mid,
                        sdp_m_line_index: payload.sdp_m_line_index,
                    });
                }
            }
            Some(ServerSignal::ConnectRequestReceived { from_device_id, relay_session_id, relay_url, .. }) => {
                let config = Arc::clone(&config);
                let signaling = Arc::clone(&signaling);
                let relay_url = relay_url.unwrap_or_else(|| config.relay_url.clone());
                let session_id = relay_session_id.unwrap_or_else(|| format!("{from_device_id}-{}", config.device_id));
                tokio::spawn(accept_relay(config, signaling, from_device_id, session_id, relay_url));
            }
            Some(ServerSignal::Ack { .. }) | Some(ServerSignal::Answer { .. }) | Some(ServerSignal::ConnectAckReceived { .. }) => {}
            Some(ServerSignal::Error { message }) => {
                tracing::warn!(message, "signaling service reported an error");
            }
            None => return Err(SessionError::SignalingClosed),
        }
    }
}

async fn answer_offer(
    config: Arc<Config>,
    signaling: Arc<SignalingClient>,
    sender_device_id: String,
    payload: SdpPayload,
    mut ice_rx: mpsc::UnboundedReceiver<IceCandidateIn>,
) {
    let (mut handles, answer_sdp) = match p2p::create_answer(Vec::new(), &payload.sdp).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(error = %e, sender_device_id, "failed to answer offer");
            return;
        }
    };

    let _ = signaling.send(ClientSignal::Answer {
        target_device_id: sender_device_id.clone(),
        payload: SdpPayload { sdp: answer_sdp, sdp_type: "answer".into() },
    });

    loop {
        if handles.transport.is_open() {
            break;
        }
        tokio::select! {
            candidate = ice_rx.recv() => {
                match candidate {
                    Some(c) => { let _ = handles.transport.add_ice_candidate(c).await; }
                    None => return,
                }
            }
            ice = handles.ice_candidates.recv() => {
                if let Some(candidate) = ice {
                    let _ = signaling.send(ClientSignal::IceCandidate {
                        target_device_id: sender_device_id.clone(),
                        payload: IceCandidatePayload {
                            candidate: candidate.candidate,
                            sdp_mid: candidate.sdp_mid,
                            sdp_m_line_index: candidate.sdp_m_line_index,
                        },
                    });
                }
            }
            state = handles.state_changes.recv() => {
                match state {
                    Some(PeerState::Failed) | Some(PeerState::Closed) | None => {
                        tracing::warn!(sender_device_id, "peer connection failed before opening");
                        return;
                    }
                    Some(_) => {}
                }
            }
        }
    }

    tracing::info!(sender_device_id, "p2p data channel open, serving");
    let transport: Arc<dyn Transport> = Arc::new(handles.transport);
    let mux = HostMultiplexer::new(
        transport,
        HostConfig { local_base_url: config.local_base_url.clone(), max_ws_connections: config.max_ws_connections },
    );
    mux.run(handles.inbound).await;
    tracing::info!(sender_device_id, "p2p session ended");
}

async fn accept_relay(config: Arc<Config>, signaling: Arc<SignalingClient>, from_device_id: String, session_id: String, relay_url: String) {
    match relay_transport::connect(&relay_url, &session_id, &config.access_token).await {
        Ok((transport, inbound)) => {
            let _ = signaling.send(ClientSignal::ConnectAck {
                target_device_id: from_device_id.clone(),
                transport: "relay".into(),
                relay_session_id: Some(session_id),
                status: ConnectStatus::Connected,
            });
            tracing::info!(from_device_id, "relay session open, serving");
            let transport: Arc<dyn Transport> = Arc::new(transport);
            let mux = HostMultiplexer::new(
                transport,
                HostConfig { local_base_url: config.local_base_url.clone(), max_ws_connections: config.max_ws_connections },
            );
            mux.run(inbound).await;
            tracing::info!(from_device_id, "relay session ended");
        }
        Err(e) => {
            tracing::warn!(error = %e, from_device_id, "relay connect failed");
            let _ = signaling.send(ClientSignal::ConnectAck {
                target_device_id: from_device_id,
                transport: "relay".into(),
                relay_session_id: Some(session_id),
                status: ConnectStatus::Failed,
            });
        }
    }
}
