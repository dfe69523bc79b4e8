//! Ping/pong keepalive.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tracing::{debug, warn};

use pharmahub_core::config::RealtimeConfig;

use super::handle::ConnectionHandle;
use crate::broadcaster::RealtimeBroadcaster;
use crate::message::ServerEvent;

/// Heartbeat timings.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
}

impl From<&RealtimeConfig> for HeartbeatConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ping_interval_seconds.max(1)),
            ping_timeout: Duration::from_secs(config.ping_timeout_seconds.max(1)),
        }
    }
}

/// Ping the connection until it dies or stops answering.
///
/// A connection whose last pong is older than the timeout is unregistered.
pub async fn run_heartbeat(
    broadcaster: Arc<RealtimeBroadcaster>,
    handle: Arc<ConnectionHandle>,
    config: HeartbeatConfig,
) {
    let mut interval = time::interval(config.ping_interval);
    interval.tick().await;

    loop {
        interval.tick().await;
        if !handle.is_alive() {
            break;
        }

        let silent = (Utc::now() - handle.last_pong()).to_std().unwrap_or_default();
        if silent > config.ping_timeout {
            warn!(conn_id = %handle.id, silent_secs = silent.as_secs(), "Heartbeat timeout");
            broadcaster.metrics().heartbeat_timeout();
            broadcaster.unregister(handle.id);
            break;
        }

        let ping = ServerEvent::Ping {
            timestamp: Utc::now().timestamp_millis(),
        };
        if !broadcaster.send_to_connection(&handle, &ping) && !handle.is_alive() {
            broadcaster.unregister(handle.id);
            break;
        }
    }

    debug!(conn_id = %handle.id, "Heartbeat loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharmahub_core::types::UserId;
    use pharmahub_entity::user::{Identity, UserRole};

    fn fast() -> HeartbeatConfig {
        HeartbeatConfig {
            ping_interval: Duration::from_millis(5),
            ping_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_silent_connection_is_unregistered() {
        let b = Arc::new(RealtimeBroadcaster::new(RealtimeConfig::default()));
        let who = Identity::new(UserId::new(), None, UserRole::Staff);
        let (handle, _rx) = b.register(&who, None);
        handle.record_pong(Utc::now() - chrono::Duration::minutes(10));

        time::timeout(
            Duration::from_secs(2),
            run_heartbeat(b.clone(), handle.clone(), fast()),
        )
        .await
        .unwrap();

        assert!(b.get(handle.id).is_none());
        assert!(!b.presence().is_online(who.user_id));
        assert_eq!(b.metrics().snapshot().heartbeat_timeouts, 1);
    }

    #[tokio::test]
    async fn test_live_connection_is_pinged() {
        let b = Arc::new(RealtimeBroadcaster::new(RealtimeConfig::default()));
        let who = Identity::new(UserId::new(), None, UserRole::Staff);
        let (handle, mut rx) = b.register(&who, None);

        let task = tokio::spawn(run_heartbeat(b.clone(), handle.clone(), fast()));
        let frame = time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        task.abort();

        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "ping");
        assert!(b.get(handle.id).is_some());
    }
}
