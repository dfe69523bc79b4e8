//! # pharmahub-realtime
//!
//! Live delivery for PharmaHub notifications:
//!
//! - connection registry addressed by user and by workspace
//! - presence tracking announced to the workspace group
//! - inbound event routing (read receipts, preferences, typing)
//! - heartbeat and counters

pub mod broadcaster;
pub mod connection;
pub mod engine;
pub mod message;
pub mod metrics;
pub mod presence;

pub use broadcaster::RealtimeBroadcaster;
pub use connection::{ConnectionHandle, ConnectionInfo};
pub use engine::RealtimeEngine;
pub use message::{ClientEvent, ServerEvent};
pub use metrics::{MetricsSnapshot, RealtimeMetrics};
pub use presence::{PresenceStatus, PresenceTracker};
