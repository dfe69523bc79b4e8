//! # pharmahub-database
//!
//! Repository traits for notifications, notification preferences and the
//! read-only workspace directory, with PostgreSQL and in-memory backends.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{
    NotificationRepository, PreferenceRepository, Repositories, WorkspaceDirectory,
};
