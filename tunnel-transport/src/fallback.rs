//! The browser endpoint's transport fallback state machine:
//!
//! ```text
//! idle -> signaling -> wb_connecting -> wb_open
//!                           ^  |
//!                           |  v (< 3 failures)
//!                         wb_failed -> relay_connecting -> relay_open
//!                                  \-> closed (>= 3 failures, ack timeout, or ack status=failed)
//! ```
//!
//! The host endpoint is symmetric but simpler: it never chooses fallback,
//! it only answers whatever the browser asks for. Its building blocks
//! ([`crate::p2p::create_answer`], [`crate::relay_transport::connect`])
//! are used directly from `tunnel-host`'s dispatch loop rather than
//! through a state machine of their own.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tunnel_protocol::device::relay_session_id;
use tunnel_protocol::signaling::{
    ClientSignal, ConnectStatus, IceCandidatePayload, PreferredTransport, SdpPayload, ServerSignal,
};

use crate::transport::Transport;

use crate::error::TransportError;
use crate::p2p::{self, IceCandidateIn, PeerState};
use crate::relay_transport;
use crate::signaling_client::SignalingClient;
use crate::transport::OpenedTransport;

pub struct FallbackConfig {
    pub ice_servers: Vec<String>,
    pub relay_url: String,
    pub watchdog: Duration,
    pub backoff_start: Duration,
    pub backoff_cap: Duration,
    pub max_attempts: u32,
    pub connect_ack_timeout: Duration,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            ice_servers: Vec::new(),
            relay_url: String::new(),
            watchdog: Duration::from_secs(15),
            backoff_start: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
            max_attempts: 3,
            connect_ack_timeout: Duration::from_secs(30),
        }
    }
}

/// Drives the browser side of the fallback state machine for a single
/// connection to `target_device_id`, returning the transport once either
/// `p2p-direct` or `relay` reaches the open state.
///
/// `signaling` and `signaling_inbound` are expected to stay alive for the
/// whole attempt; per the state machine, the signaling WebSocket MUST
/// remain open across `wb_connecting` retries.
pub async fn connect(
    signaling: &SignalingClient,
    signaling_inbound: &mut mpsc::UnboundedReceiver<ServerSignal>,
    own_device_id: &str,
    target_device_id: &str,
    access_token: &str,
    config: &FallbackConfig,
) -> Result<OpenedTransport, TransportError> {
    let mut backoff = config.backoff_start;

    for attempt in 1..=config.max_attempts {
        tracing::info!(attempt, target_device_id, "wb_connecting");
        match try_p2p_once(signaling, signaling_inbound, target_device_id, config).await {
            Ok(opened) => {
                tracing::info!(target_device_id, "wb_open");
                return Ok(opened);
            }
            Err(e) => {
                tracing::warn!(attempt, target_device_id, error = %e, "wb_failed");
                if attempt < config.max_attempts {
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(config.backoff_cap);
                }
            }
        }
    }

    relay_fallback(signaling, signaling_inbound, own_device_id, target_device_id, access_token, config).await
}

async fn try_p2p_once(
    signaling: &SignalingClient,
    signaling_inbound: &mut mpsc::UnboundedReceiver<ServerSignal>,
    target_device_id: &str,
    config: &FallbackConfig,
) -> Result<OpenedTransport, TransportError> {
    let (mut handles, offer_sdp) = p2p::create_offer(config.ice_servers.clone()).await?;

    signaling
        .send(ClientSignal::Offer {
            target_device_id: target_device_id.to_string(),
            payload: SdpPayload {
                sdp: offer_sdp,
                sdp_type: "offer".to_string(),
            },
        })
        .map_err(|_| TransportError::SignalingFailed("signaling channel closed".into()))?;

    let watchdog = sleep(config.watchdog);
    tokio::pin!(watchdog);

    loop {
        if handles.transport.is_open() {
            return Ok(OpenedTransport {
                handle: Box::new(handles.transport),
                inbound: handles.inbound,
            });
        }
        tokio::select! {
            _ = &mut watchdog => {
                handles.transport.close().await;
                return Err(TransportError::Timeout("wb_connecting"));
            }
            ice = handles.ice_candidates.recv() => {
                if let Some(candidate) = ice {
                    let _ = signaling.send(ClientSignal::IceCandidate {
                        target_device_id: target_device_id.to_string(),
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
                    Some(PeerState::Failed) | Some(PeerState::Closed) => {
                        handles.transport.close().await;
                        return Err(TransportError::PeerConnectionFailed("peer connection failed".into()));
                    }
                    Some(_) => {}
                    None => {
                        return Err(TransportError::PeerConnectionFailed("peer connection event stream closed".into()));
                    }
                }
            }
            signal = signaling_inbound.recv() => {
                match signal {
                    Some(ServerSignal::Answer { sender_device_id, payload }) if sender_device_id == target_device_id => {
                        handles.transport.set_remote_answer(payload.sdp).await?;
                    }
                    Some(ServerSignal::IceCandidate { sender_device_id, payload }) if sender_device_id == target_device_id => {
                        let _ = handles.transport.add_ice_candidate(IceCandidateIn {
                            candidate: payload.candidate,
                            sdp_mid: payload.sdp_mid,
                            sdp_m_line_index: payload.sdp_m_line_index,
                        }).await;
                    }
                    Some(_) => {}
                    None => {
                        return Err(TransportError::SignalingFailed("signaling connection closed".into()));
                    }
                }
            }
        }
    }
}

async fn relay_fallback(
    signaling: &SignalingClient,
    signaling_inbound: &mut mpsc::UnboundedReceiver<ServerSignal>,
    own_device_id: &str,
    target_device_id: &str,
    access_token: &str,
    config: &FallbackConfig,
) -> Result<OpenedTransport, TransportError> {
    tracing::info!(target_device_id, "relay_connecting");
    let session_id = relay_session_id(own_device_id, target_device_id);

    signaling
        .send(ClientSignal::ConnectRequest {
            target_device_id: target_device_id.to_string(),
            preferred_transport: PreferredTransport::Relay,
            relay_session_id: Some(session_id.clone()),
        })
        .map_err(|_| TransportError::SignalingFailed("signaling channel closed".into()))?;

    let ack = timeout(config.connect_ack_timeout, wait_for_ack(signaling_inbound, target_device_id))
        .await
        .map_err(|_| TransportError::Timeout("connect-ack"))??;

    if ack.status == ConnectStatus::Failed {
        return Err(TransportError::RelayFailed("peer reported connect-ack status=failed".into()));
    }

    let (transport, inbound) = relay_transport::connect(&config.relay_url, &session_id, access_token).await?;
    tracing::info!(target_device_id, "relay_open");
    Ok(OpenedTransport {
        handle: Box::new(transport),
        inbound,
    })
}

struct ConnectAck {
    status: ConnectStatus,
}

async fn wait_for_ack(
    signaling_inbound: &mut mpsc::UnboundedReceiver<ServerSignal>,
    target_device_id: &str,
) -> Result<ConnectAck, TransportError> {
    loop {
        match signaling_inbound.recv().await {
            Some(ServerSignal::ConnectAckReceived { from_device_id, status, .. }) if from_device_id == target_device_id => {
                return Ok(ConnectAck { status });
            }
            Some(_) => continue,
            None => return Err(TransportError::SignalingFailed("signaling connection closed".into())),
        }
    }
}
