use serde::Serialize;

use crate::position::Accuracy;
use crate::resolver::ServiceConfig;
use crate::subscriber::AppState;

/// Point-in-time view of the broker, for diagnostics.
///
/// Counters are cumulative since the broker was built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerStatus {
    /// Registered location subscribers.
    pub location_subscribers: usize,
    /// Registered region subscribers.
    pub region_subscribers: usize,
    /// Last known lifecycle state.
    pub app_state: AppState,
    /// Services the provider was last told to run.
    pub service: ServiceConfig,
    /// Last accuracy sent to the provider.
    pub current_accuracy: Option<Accuracy>,
    /// Provider events dropped because the queue was full.
    pub dropped_events: u64,
    /// Region events dropped because their owner could not be found.
    pub dropped_region_events: u64,
    /// Declared regions rejected for malformed identifiers, each counted once
    /// while it stays declared.
    pub rejected_regions: u64,
    /// Region subscribers rejected for a malformed or duplicate identifier.
    pub rejected_subscribers: u64,
}
