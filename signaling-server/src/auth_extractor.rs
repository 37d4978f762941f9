//! Extracts and verifies a bearer access token from the `Authorization`
//! header, for use by handlers that require an authenticated caller.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tunnel_protocol::auth::verify_token;

/// The authenticated user id extracted from a valid bearer token.
pub struct AuthUser(pub i64);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::AuthenticationFailed)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::AuthenticationFailed)?;

        let claims = verify_token(&state.config.jwt_secret, token)
            .map_err(|_| ApiError::AuthenticationFailed)?;

        Ok(AuthUser(claims.sub))
    }
}
