//! JSON message types exchanged over the signaling WebSocket
//! (`GET /signal?token=&device_id=`).
//!
//! The client-to-server and server-to-client alphabets are modeled as two
//! separate enums rather than one bidirectional type: the `offer`/`answer`/
//! `ice-candidate` messages carry a `target_device_id` when sent by a
//! client and a `sender_device_id` once the signaling service has rewritten
//! and relayed them, and a single shared type would need every field
//! optional to represent both shapes.

use serde::{Deserialize, Serialize};

/// SDP payload carried by `offer` and `answer` messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SdpPayload {
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: String,
}

/// ICE candidate payload carried by `ice-candidate` messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceCandidatePayload {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u32>,
}

/// Transport preference attached to `connect-request` / `connect-ack`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PreferredTransport {
    Webrtc,
    Relay,
    Auto,
}

/// Status reported in `connect-ack` / `connect-ack-received`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectStatus {
    Connecting,
    Connected,
    Failed,
}

/// Messages a device sends to the signaling service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientSignal {
    Offer {
        target_device_id: String,
        payload: SdpPayload,
    },
    Answer {
        target_device_id: String,
        payload: SdpPayload,
    },
    #[serde(rename = "ice-candidate")]
    IceCandidate {
        target_device_id: String,
        payload: IceCandidatePayload,
    },
    #[serde(rename = "connect-request")]
    ConnectRequest {
        target_device_id: String,
        preferred_transport: PreferredTransport,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relay_session_id: Option<String>,
    },
    #[serde(rename = "connect-ack")]
    ConnectAck {
        target_device_id: String,
        transport: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relay_session_id: Option<String>,
        status: ConnectStatus,
    },
}

impl ClientSignal {
    /// The `target_device_id` every routed client message carries.
    pub fn target_device_id(&self) -> &str {
        match self {
            ClientSignal::Offer { target_device_id, .. }
            | ClientSignal::Answer { target_device_id, .. }
            | ClientSignal::IceCandidate { target_device_id, .. }
            | ClientSignal::ConnectRequest { target_device_id, .. }
            | ClientSignal::ConnectAck { target_device_id, .. } => target_device_id,
        }
    }
}

/// Messages the signaling service sends to a device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerSignal {
    Connected {
        device_id: String,
        message: String,
    },
    Offer {
        sender_device_id: String,
        payload: SdpPayload,
    },
    Answer {
        sender_device_id: String,
        payload: SdpPayload,
    },
    #[serde(rename = "ice-candidate")]
    IceCandidate {
        sender_device_id: String,
        payload: IceCandidatePayload,
    },
    #[serde(rename = "connect-request-received")]
    ConnectRequestReceived {
        from_device_id: String,
        preferred_transport: PreferredTransport,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relay_session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relay_url: Option<String>,
    },
    #[serde(rename = "connect-ack-received")]
    ConnectAckReceived {
        from_device_id: String,
        transport: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relay_session_id: Option<String>,
        status: ConnectStatus,
    },
    Ack {
        message: String,
    },
    Error {
        message: String,
    },
}

impl ClientSignal {
    /// Rewrites a routed client message into the form relayed to the
    /// target device: `target_device_id` is replaced by the identity of
    /// the sender (as `sender_device_id` or `from_device_id`, per type).
    pub fn into_relayed(self, sender_device_id: String) -> ServerSignal {
        match self {
            ClientSignal::Offer { payload, .. } => ServerSignal::Offer {
                sender_device_id,
                payload,
            },
            ClientSignal::Answer { payload, .. } => ServerSignal::Answer {
                sender_device_id,
                payload,
            },
            ClientSignal::IceCandidate { payload, .. } => ServerSignal::IceCandidate {
                sender_device_id,
                payload,
            },
            ClientSignal::ConnectRequest {
                preferred_transport,
                relay_session_id,
                ..
            } => ServerSignal::ConnectRequestReceived {
                from_device_id: sender_device_id,
                preferred_transport,
                relay_session_id,
                relay_url: None,
            },
            ClientSignal::ConnectAck {
                transport,
                relay_session_id,
                status,
                ..
            } => ServerSignal::ConnectAckReceived {
                from_device_id: sender_device_id,
                transport,
                relay_session_id,
                status,
            },
        }
    }
}

/// The maximum size, in bytes, of a single signaling WebSocket text frame.
pub const MAX_SIGNAL_MESSAGE_BYTES: usize = 64 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_signal_serializes_with_kebab_case_tag() {
        let msg = ClientSignal::IceCandidate {
            target_device_id: "host-1".into(),
            payload: IceCandidatePayload {
                candidate: "candidate:1 1 udp".into(),
                sdp_mid: Some("0".into()),
                sdp_m_line_index: Some(0),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ice-candidate");
        assert_eq!(json["payload"]["sdpMid"], "0");
    }

    #[test]
    fn connect_request_round_trips_through_json() {
        let msg = ClientSignal::ConnectRequest {
            target_device_id: "host-1".into(),
            preferred_transport: PreferredTransport::Relay,
            relay_session_id: Some("browser-A-host-B".into()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn relaying_an_offer_swaps_target_for_sender() {
        let offer = ClientSignal::Offer {
            target_device_id: "host-1".into(),
            payload: SdpPayload {
                sdp: "v=0".into(),
                sdp_type: "offer".into(),
            },
        };
        let relayed = offer.into_relayed("browser-1".into());
        match relayed {
            ServerSignal::Offer { sender_device_id, payload } => {
                assert_eq!(sender_device_id, "browser-1");
                assert_eq!(payload.sdp_type, "offer");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn connect_request_relays_to_connect_request_received() {
        let req = ClientSignal::ConnectRequest {
            target_device_id: "host-1".into(),
            preferred_transport: PreferredTransport::Relay,
            relay_session_id: Some("sid".into()),
        };
        let relayed = req.into_relayed("browser-1".into());
        assert!(matches!(
            relayed,
            ServerSignal::ConnectRequestReceived { from_device_id, .. } if from_device_id == "browser-1"
        ));
    }
}
