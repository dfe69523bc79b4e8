//! # pharmahub-core
//!
//! Core crate for the PharmaHub notification subsystem. Contains the
//! configuration schema, typed identifiers, workspace domain events,
//! pagination types, the cache provider trait, and the unified error system.
//!
//! This crate has **no** internal dependencies on other PharmaHub crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
