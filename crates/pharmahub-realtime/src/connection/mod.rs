//! Connection handles, the pool and heartbeat.

pub mod handle;
pub mod heartbeat;
pub mod pool;

pub use handle::{ConnectionHandle, ConnectionInfo};
pub use pool::ConnectionPool;
