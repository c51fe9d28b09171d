//! Periodic removal of idle sessions.

use crate::config::{DEFAULT_IDLE_TIMEOUT_MINUTES, SessionConfig};
use chrono::{TimeDelta, Utc};
use lingochat_conversation::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Drops sessions idle for longer than `idle_timeout`. Returns how many were
/// removed.
pub fn sweep_idle(store: &SessionStore, idle_timeout: TimeDelta) -> usize {
    store.evict_idle(Utc::now() - idle_timeout)
}

/// Spawns the periodic idle session sweep.
pub fn spawn_session_sweeper(store: Arc<SessionStore>, config: &SessionConfig) -> JoinHandle<()> {
    let idle_timeout = config
        .idle_timeout()
        .unwrap_or_else(|| TimeDelta::minutes(DEFAULT_IDLE_TIMEOUT_MINUTES));
    let period = Duration::from_secs(config.cleanup_interval_seconds.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = sweep_idle(&store, idle_timeout);
            if removed > 0 {
                tracing::debug!(
                    removed_sessions = removed,
                    remaining_sessions = store.len(),
                    "Periodic session cleanup"
                );
            }
        }
    })
}
