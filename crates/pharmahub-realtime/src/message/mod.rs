//! Wire events.

pub mod types;

pub use types::{ClientEvent, ServerEvent};
