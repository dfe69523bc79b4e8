//! The identity provider seam.

use async_trait::async_trait;
use tracing::debug;

use pharmahub_core::config::AuthConfig;
use pharmahub_core::result::AppResult;
use pharmahub_entity::user::Identity;

use crate::jwt::JwtDecoder;

/// Verifies a bearer credential.
///
/// Shared by the REST extractor and the realtime handshake so both accept
/// exactly the same tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Resolve `token` to an identity, or fail with an authentication error.
    async fn verify(&self, token: &str) -> AppResult<Identity>;
}

/// [`IdentityProvider`] over self-contained HS256 tokens.
#[derive(Debug, Clone)]
pub struct JwtIdentityProvider {
    decoder: JwtDecoder,
}

impl JwtIdentityProvider {
    /// Build a provider from `config`.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            decoder: JwtDecoder::new(config),
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> AppResult<Identity> {
        let claims = self.decoder.decode(token)?;
        debug!(user_id = %claims.sub, role = %claims.role, "Verified bearer token");
        Ok(claims.identity())
    }
}

/// The token inside an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
