use std::time::Duration;

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Max queued operations before producers wait (mutations) or events are
    /// dropped (provider callbacks).
    pub queue_capacity: usize,
    /// Name of the worker thread.
    pub thread_name: String,
    /// Timeout used by `LocationBroker::sync`.
    pub sync_timeout: Duration,
    /// Read the provider's last known position into `current_location` at startup.
    pub seed_current_location: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            thread_name: "locbroker-worker".to_string(),
            sync_timeout: Duration::from_secs(5),
            seed_current_location: true,
        }
    }
}
