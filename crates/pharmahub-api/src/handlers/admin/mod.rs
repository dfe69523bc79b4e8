//! Operator endpoints. Every handler requires a platform administrator.

pub mod context;
pub mod jobs;
pub mod notifications;
