//! Idempotent self-registration against the signaling service's REST
//! surface, run once at startup before the signaling WebSocket dials.

use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("device registration request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("device id {0} is registered to a different account")]
    Conflict(String),
    #[error("device registration rejected: {0}")]
    Rejected(u16),
}

pub async fn register(signaling_url: &str, access_token: &str, device_id: &str, pubkey: &str) -> Result<(), RegisterError> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{signaling_url}/devices/register"))
        .bearer_auth(access_token)
        .json(&json!({ "device_id": device_id, "pubkey": pubkey }))
        .send()
        .await?;

    match response.status().as_u16() {
        200 | 201 => Ok(()),
        409 => Err(RegisterError::Conflict(device_id.to_string())),
        other => Err(RegisterError::Rejected(other)),
    }
}
