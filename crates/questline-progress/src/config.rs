//! Coordinator tuning.

use std::time::Duration;

/// Timeouts and write-behind policy for a [`ProgressCoordinator`](crate::ProgressCoordinator).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Upper bound on one catalog load.
    pub catalog_load_timeout: Duration,
    /// Upper bound on loading one actor's session.
    pub session_load_timeout: Duration,
    /// Attempts per durable write before it is given up.
    pub persist_max_attempts: u32,
    /// Delay before the second attempt; doubled for each later one.
    pub persist_retry_backoff: Duration,
    /// Upserts issued concurrently by one drain.
    pub persist_concurrency: usize,
    /// Buffer of the notification broadcast channel.
    pub notification_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            catalog_load_timeout: Duration::from_secs(5),
            session_load_timeout: Duration::from_secs(2),
            persist_max_attempts: 3,
            persist_retry_backoff: Duration::from_millis(100),
            persist_concurrency: 8,
            notification_capacity: 1024,
        }
    }
}
