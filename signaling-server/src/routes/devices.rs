//! `POST /devices/register`, `GET /devices/`.

use crate::auth_extractor::AuthUser;
use crate::error::ApiError;
use crate::repo::devices::{self, UpsertOutcome};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct RegisterDevice {
    device_id: String,
    /// Opaque public key material; stored verbatim, never verified.
    pubkey: String,
}

#[derive(Serialize)]
pub struct DeviceView {
    device_id: String,
    user_id: i64,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<devices::DeviceRow> for DeviceView {
    fn from(row: devices::DeviceRow) -> Self {
        Self {
            device_id: row.device_id,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

pub async fn register_device(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<RegisterDevice>,
) -> Result<(StatusCode, Json<DeviceView>), ApiError> {
    if body.device_id.trim().is_empty() {
        return Err(ApiError::ValidationError("device_id must not be empty".into()));
    }
    if body.pubkey.trim().is_empty() {
        return Err(ApiError::ValidationError("pubkey must not be empty".into()));
    }
    let pubkey = body.pubkey.into_bytes();

    match devices::upsert_device(&state.pool, &body.device_id, user_id, &pubkey).await? {
        UpsertOutcome::Created(row) => Ok((StatusCode::CREATED, Json(row.into()))),
        UpsertOutcome::AlreadyOwned(row) => Ok((StatusCode::OK, Json(row.into()))),
        UpsertOutcome::OwnedByAnotherUser => {
            Err(ApiError::Conflict("device id owned by another user".into()))
        }
    }
}

pub async fn list_devices(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<DeviceView>>, ApiError> {
    let rows = devices::list_for_user(&state.pool, user_id).await?;
    Ok(Json(rows.into_iter().map(DeviceView::from).collect()))
}
