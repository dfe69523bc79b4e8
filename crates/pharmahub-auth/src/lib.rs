//! # pharmahub-auth
//!
//! Verifies bearer credentials for the REST surface and the realtime
//! handshake. Token issuance for end users lives elsewhere; the encoder
//! here exists for operators and tests.
//!
//! - `jwt`: HS256 claims, decoder and encoder
//! - `identity`: the [`IdentityProvider`] seam and its JWT implementation
//! - `guard`: role checks for admin-only operations

pub mod guard;
pub mod identity;
pub mod jwt;

pub use guard::{require_platform_admin, require_role};
pub use identity::{IdentityProvider, JwtIdentityProvider, bearer_token};
pub use jwt::{Claims, JwtDecoder, JwtEncoder};
