//! Redis connection handle.

use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use pharmahub_core::config::RedisCacheConfig;
use pharmahub_core::error::{AppError, ErrorKind};
use pharmahub_core::result::AppResult;

/// Reconnecting Redis connection plus the key namespace.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
    key_prefix: String,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisClient {
    /// Connect using `config`.
    pub async fn connect(config: &RedisCacheConfig) -> AppResult<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| AppError::with_source(ErrorKind::Cache, "Invalid Redis URL", e))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Cache, "Cannot reach Redis", e))?;

        info!(prefix = %config.key_prefix, "Connected to Redis");
        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// A connection handle. Clones share the underlying multiplexed connection.
    pub fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// `key` inside this client's namespace.
    pub fn namespaced(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }
}
