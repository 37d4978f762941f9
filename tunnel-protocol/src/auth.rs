//! Bearer access tokens shared between the signaling and relay services.
//!
//! Tokens are stateless JWTs signed with a single symmetric secret that
//! both services must be configured with identically; there is no
//! revocation list in this revision, only expiry.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// The authenticated user id.
    pub sub: i64,
    /// Expiry, as a unix timestamp (seconds).
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is invalid or expired")]
    Invalid,
}

/// Signs a fresh access token for `user_id`, valid for `ttl_seconds` from `now`.
pub fn issue_token(secret: &str, user_id: i64, now: i64, ttl_seconds: i64) -> String {
    let claims = AccessClaims {
        sub: user_id,
        exp: now + ttl_seconds,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("HS256 encoding of a small claims struct never fails")
}

/// Verifies and decodes an access token. Stateless: correctness depends
/// only on the shared secret and the token's own expiry claim.
pub fn verify_token(secret: &str, token: &str) -> Result<AccessClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| TokenError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_valid_token() {
        let token = issue_token("shared-secret", 42, 1_000_000, 3600);
        let claims = verify_token("shared-secret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.exp, 1_003_600);
    }

    #[test]
    fn rejects_token_signed_with_a_different_secret() {
        let token = issue_token("secret-a", 1, 1_000_000, 3600);
        assert!(verify_token("secret-b", &token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        // exp in the distant past relative to wall-clock validation.
        let token = issue_token("shared-secret", 1, 0, -10);
        assert!(verify_token("shared-secret", &token).is_err());
    }
}
