//! # pharmahub-api
//!
//! HTTP surface of the notification core, built on Axum: the user-facing
//! notification routes, operator routes, the WebSocket upgrade, the bearer
//! token extractor, and mapping of `AppError` onto JSON error bodies.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, build_state, build_state_with_channels, run_server};
pub use error::ApiError;
pub use state::AppState;
