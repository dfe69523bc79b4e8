//! `AuthUser`: verifies the bearer token and resolves the caller's
//! workspace context.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use pharmahub_auth::{bearer_token, require_platform_admin};
use pharmahub_core::error::AppError;
use pharmahub_service::RequestContext;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller available in handlers.
#[derive(Debug, Clone)]
pub struct AuthUser(pub RequestContext);

impl AuthUser {
    pub fn context(&self) -> &RequestContext {
        &self.0
    }

    /// Fail unless the caller is a platform administrator.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        require_platform_admin(&self.0.identity).map_err(ApiError::from)
    }
}

impl std::ops::Deref for AuthUser {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::authentication("Missing Authorization header"))?;

        let token = bearer_token(header)
            .ok_or_else(|| AppError::authentication("Invalid Authorization header format"))?;

        let identity = state.identity.verify(token).await?;
        let workspace = state.resolver.resolve(&identity).await;

        Ok(AuthUser(RequestContext::new(identity, workspace)))
    }
}
