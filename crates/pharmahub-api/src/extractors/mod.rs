//! Custom Axum extractors.

pub mod auth;
pub mod query;
pub mod validated;

pub use auth::AuthUser;
pub use query::ListNotificationsQuery;
pub use validated::ValidatedJson;
