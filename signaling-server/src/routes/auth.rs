//! `POST /auth/register`, `POST /auth/login`.

use crate::error::ApiError;
use crate::passwords::{hash_password, verify_password};
use crate::repo::users;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tunnel_protocol::auth::issue_token;

#[derive(Deserialize)]
pub struct Credentials {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    access_token: String,
}

fn validate_credentials(creds: &Credentials) -> Result<(), ApiError> {
    if creds.email.trim().is_empty() || !creds.email.contains('@') {
        return Err(ApiError::ValidationError("invalid email".into()));
    }
    if creds.password.len() < 8 {
        return Err(ApiError::ValidationError(
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    validate_credentials(&creds)?;
    let hash = hash_password(&creds.password);

    let user = users::create_user(&state.pool, &creds.email, &hash)
        .await?
        .ok_or_else(|| ApiError::Conflict("email already registered".into()))?;

    Ok(Json(TokenResponse {
        access_token: issue_token(
            &state.config.jwt_secret,
            user.id,
            now_unix(),
            state.config.token_ttl.as_secs() as i64,
        ),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = users::find_by_email(&state.pool, &creds.email)
        .await?
        .ok_or(ApiError::AuthenticationFailed)?;

    if !verify_password(&creds.password, &user.password_hash) {
        return Err(ApiError::AuthenticationFailed);
    }

    Ok(Json(TokenResponse {
        access_token: issue_token(
            &state.config.jwt_secret,
            user.id,
            now_unix(),
            state.config.token_ttl.as_secs() as i64,
        ),
    }))
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
