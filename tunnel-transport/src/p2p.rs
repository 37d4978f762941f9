//! `p2p-direct` transport: a single bidirectional `RTCDataChannel` labeled
//! `"http-proxy"`, negotiated out-of-band via the signaling service.
//!
//! This module only knows how to stand up the peer connection and move
//! bytes across the data channel once it exists; SDP/ICE exchange over
//! the signaling WebSocket and the fallback state machine both live one
//! layer up, in [`crate::signaling_client`] and [`crate::fallback`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::error::TransportError;
use crate::transport::Transport;

pub const DATA_CHANNEL_LABEL: &str = "http-proxy";

/// An ICE candidate produced locally, destined for the peer via signaling.
#[derive(Debug, Clone)]
pub struct IceCandidateOut {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u32>,
}

/// An ICE candidate received from the peer via signaling.
#[derive(Debug, Clone)]
pub struct IceCandidateIn {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u32>,
}

/// Coarse peer-connection lifecycle events the fallback state machine
/// watches to drive `wb_connecting -> wb_open -> wb_failed` transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Everything a caller needs after standing up a peer connection: the
/// transport handle plus the three channels events arrive on.
pub struct P2pHandles {
    pub transport: P2pTransport,
    pub inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    pub ice_candidates: mpsc::UnboundedReceiver<IceCandidateOut>,
    pub state_changes: mpsc::UnboundedReceiver<PeerState>,
}

pub struct P2pTransport {
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    open: Arc<AtomicBool>,
}

fn parse_ice_servers(urls: &[String]) -> Vec<RTCIceServer> {
    urls.iter()
        .map(|url| RTCIceServer {
            urls: vec![url.clone()],
            ..Default::default()
        })
        .collect()
}

async fn build_peer_connection(ice_servers: Vec<String>) -> Result<Arc<RTCPeerConnection>, TransportError> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .map_err(|e| TransportError::PeerConnectionFailed(format!("codec registration: {e}")))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| TransportError::PeerConnectionFailed(format!("interceptor registration: {e}")))?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let config = RTCConfiguration {
        ice_servers: parse_ice_servers(&ice_servers),
        ..Default::default()
    };

    let pc = api
        .new_peer_connection(config)
        .await
        .map_err(|e| TransportError::PeerConnectionFailed(format!("new_peer_connection: {e}")))?;
    Ok(Arc::new(pc))
}

fn wire_data_channel(
    dc: Arc<RTCDataChannel>,
    data_channel_slot: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    open: Arc<AtomicBool>,
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
) {
    let opened_slot = Arc::clone(&data_channel_slot);
    let opened_open = Arc::clone(&open);
    let opened_dc = Arc::clone(&dc);
    dc.on_open(Box::new(move || {
        let slot = Arc::clone(&opened_slot);
        let open = Arc::clone(&opened_open);
        let dc = Arc::clone(&opened_dc);
        Box::pin(async move {
            *slot.lock().await = Some(dc);
            open.store(true, Ordering::SeqCst);
        })
    }));

    dc.on_message(Box::new(move |msg| {
        let inbound_tx = inbound_tx.clone();
        Box::pin(async move {
            let _ = inbound_tx.send(msg.data.to_vec());
        })
    }));

    let close_slot = Arc::clone(&data_channel_slot);
    let close_open = Arc::clone(&open);
    dc.on_close(Box::new(move || {
        let slot = Arc::clone(&close_slot);
        let open = Arc::clone(&close_open);
        Box::pin(async move {
            *slot.lock().await = None;
            open.store(false, Ordering::SeqCst);
        })
    }));
}

fn wire_peer_connection(
    pc: &Arc<RTCPeerConnection>,
    open: Arc<AtomicBool>,
    ice_tx: mpsc::UnboundedSender<IceCandidateOut>,
    state_tx: mpsc::UnboundedSender<PeerState>,
) {
    pc.on_ice_candidate(Box::new(move |candidate| {
        let ice_tx = ice_tx.clone();
        Box::pin(async move {
            let Some(candidate) = candidate else { return };
            let Ok(json) = candidate.to_json() else { return };
            let _ = ice_tx.send(IceCandidateOut {
                candidate: json.candidate,
                sdp_mid: json.sdp_mid,
                sdp_m_line_index: json.sdp_mline_index.map(|v| v as u32),
            });
        })
    }));

    pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
        let state_tx = state_tx.clone();
        let open = Arc::clone(&open);
        Box::pin(async move {
            let mapped = match s {
                RTCPeerConnectionState::Connected => Some(PeerState::Connected),
                RTCPeerConnectionState::Disconnected => Some(PeerState::Disconnected),
                RTCPeerConnectionState::Failed => {
                    open.store(false, Ordering::SeqCst);
                    Some(PeerState::Failed)
                }
                RTCPeerConnectionState::Closed => {
                    open.store(false, Ordering::SeqCst);
                    Some(PeerState::Closed)
                }
                _ => None,
            };
            if let Some(mapped) = mapped {
                let _ = state_tx.send(mapped);
            }
        })
    }));
}

/// Creates the offering side: opens the data channel ourselves and
/// returns the SDP offer to send to the target device over signaling.
pub async fn create_offer(ice_servers: Vec<String>) -> Result<(P2pHandles, String), TransportError> {
    let pc = build_peer_connection(ice_servers).await?;
    let open = Arc::new(AtomicBool::new(false));
    let data_channel_slot = Arc::new(Mutex::new(None));

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (ice_tx, ice_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = mpsc::unbounded_channel();

    wire_peer_connection(&pc, Arc::clone(&open), ice_tx, state_tx);

    let dc = pc
        .create_data_channel(
            DATA_CHANNEL_LABEL,
            Some(RTCDataChannelInit {
                ordered: Some(true),
                ..Default::default()
            }),
        )
        .await
        .map_err(|e| TransportError::PeerConnectionFailed(format!("create_data_channel: {e}")))?;
    wire_data_channel(dc, Arc::clone(&data_channel_slot), Arc::clone(&open), inbound_tx);

    let offer = pc
        .create_offer(None)
        .await
        .map_err(|e| TransportError::PeerConnectionFailed(format!("create_offer: {e}")))?;
    pc.set_local_description(offer.clone())
        .await
        .map_err(|e| TransportError::PeerConnectionFailed(format!("set_local_description: {e}")))?;

    let handles = P2pHandles {
        transport: P2pTransport {
            peer_connection: pc,
            data_channel: data_channel_slot,
            open,
        },
        inbound: inbound_rx,
        ice_candidates: ice_rx,
        state_changes: state_rx,
    };
    Ok((handles, offer.sdp))
}

/// Creates the answering side: sets the peer's offer as remote
/// description, waits for the peer-opened data channel, and returns the
/// SDP answer to relay back over signaling.
pub async fn create_answer(
    ice_servers: Vec<String>,
    remote_offer_sdp: &str,
) -> Result<(P2pHandles, String), TransportError> {
    let pc = build_peer_connection(ice_servers).await?;
    let open = Arc::new(AtomicBool::new(false));
    let data_channel_slot = Arc::new(Mutex::new(None));

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (ice_tx, ice_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = mpsc::unbounded_channel();

    wire_peer_connection(&pc, Arc::clone(&open), ice_tx, state_tx);

    let offer = RTCSessionDescription::offer(remote_offer_sdp.to_string())
        .map_err(|e| TransportError::PeerConnectionFailed(format!("invalid remote offer: {e}")))?;
    pc.set_remote_description(offer)
        .await
        .map_err(|e| TransportError::PeerConnectionFailed(format!("set_remote_description: {e}")))?;

    let dc_slot_for_handler = Arc::clone(&data_channel_slot);
    let open_for_handler = Arc::clone(&open);
    pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        let dc_slot = Arc::clone(&dc_slot_for_handler);
        let open = Arc::clone(&open_for_handler);
        let inbound_tx = inbound_tx.clone();
        Box::pin(async move {
            wire_data_channel(dc, dc_slot, open, inbound_tx);
        })
    }));

    let answer = pc
        .create_answer(None)
        .await
        .map_err(|e| TransportError::PeerConnectionFailed(format!("create_answer: {e}")))?;
    pc.set_local_description(answer.clone())
        .await
        .map_err(|e| TransportError::PeerConnectionFailed(format!("set_local_description: {e}")))?;

    let handles = P2pHandles {
        transport: P2pTransport {
            peer_connection: pc,
            data_channel: data_channel_slot,
            open,
        },
        inbound: inbound_rx,
        ice_candidates: ice_rx,
        state_changes: state_rx,
    };
    Ok((handles, answer.sdp))
}

impl P2pTransport {
    /// Sets the peer's SDP answer as the remote description. Only valid
    /// on the offering side, after [`create_offer`].
    pub async fn set_remote_answer(&self, sdp: String) -> Result<(), TransportError> {
        let answer = RTCSessionDescription::answer(sdp)
            .map_err(|e| TransportError::PeerConnectionFailed(format!("invalid remote answer: {e}")))?;
        self.peer_connection
            .set_remote_description(answer)
            .await
            .map_err(|e| TransportError::PeerConnectionFailed(format!("set_remote_description: {e}")))
    }

    pub async fn add_ice_candidate(&self, candidate: IceCandidateIn) -> Result<(), TransportError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index.map(|v| v as u16),
            ..Default::default()
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| TransportError::PeerConnectionFailed(format!("add_ice_candidate: {e}")))
    }
}

#[async_trait]
impl Transport for P2pTransport {
    async fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let guard = self.data_channel.lock().await;
        let dc = guard.as_ref().ok_or(TransportError::Closed)?;
        dc.send(&bytes::Bytes::from(bytes))
            .await
            .map(|_| ())
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(dc) = self.data_channel.lock().await.take() {
            let _ = dc.close().await;
        }
        let _ = self.peer_connection.close().await;
    }
}
