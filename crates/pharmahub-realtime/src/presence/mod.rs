//! User presence.

pub mod status;
pub mod tracker;

pub use status::PresenceStatus;
pub use tracker::PresenceTracker;
