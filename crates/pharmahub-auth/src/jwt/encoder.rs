//! Access-token minting for operators and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use pharmahub_core::config::AuthConfig;
use pharmahub_core::error::AppError;
use pharmahub_core::result::AppResult;
use pharmahub_entity::user::Identity;

use super::claims::Claims;

/// Signs HS256 access tokens.
#[derive(Clone)]
pub struct JwtEncoder {
    key: EncodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl JwtEncoder {
    /// Build an encoder from `config`.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl: Duration::minutes(config.jwt_access_ttl_minutes as i64),
        }
    }

    /// Token for `identity` with the configured TTL.
    pub fn issue(&self, identity: &Identity) -> AppResult<String> {
        self.issue_with_ttl(identity, self.ttl)
    }

    /// Token for `identity` expiring after `ttl`. A negative TTL yields an expired token.
    pub fn issue_with_ttl(&self, identity: &Identity, ttl: Duration) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.user_id,
            wid: identity.workspace_id,
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4(),
        };
        encode(&Header::default(), &claims, &self.key)
            .map_err(|e| AppError::internal(format!("Failed to sign token: {e}")))
    }
}
