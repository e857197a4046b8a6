//! Subscriber interfaces.
//!
//! Two kinds of subscriber exist: location subscribers declare which services
//! they need and at what accuracy, region subscribers declare which regions
//! they want monitored. Both own their declared state; the broker only reads it.
//!
//! Optional capabilities (error callbacks) are exposed through accessor
//! methods returning `Option<&dyn ...>`. The broker asks before calling and a
//! subscriber that answers `None` simply never receives those callbacks.
//!
//! Identity is reference identity: two handles denote the same subscriber only
//! if they point at the same allocation.

use std::sync::Arc;

use crate::position::{Accuracy, PositionBatch};
use crate::provider::ProviderError;
use crate::region::Region;

/// Explicitly notifying subscriber state.
pub mod observed;
/// Option bits and lifecycle state.
pub mod options;

pub use observed::{ObservedLocationDemand, ObservedRegionSet};
pub use options::{AppState, SubscriberOptions};

/// Shared handle to a location subscriber.
pub type LocationSubscriberRef = Arc<dyn LocationSubscriber>;

/// Shared handle to a region subscriber.
pub type RegionSubscriberRef = Arc<dyn RegionSubscriber>;

/// A consumer of position updates.
pub trait LocationSubscriber: Send + Sync {
    /// What this subscriber wants. The empty mask means "registered but idle".
    fn location_subscriber_options(&self) -> SubscriberOptions;

    /// Accuracy wanted for continuous updates. Ignored unless the options
    /// include [`SubscriberOptions::CONTINUOUS`].
    fn desired_accuracy(&self) -> Accuracy;

    /// Receives every batch the broker gets while this subscriber is active.
    ///
    /// Batches are delivered at whatever accuracy the broker currently runs,
    /// which may be tighter than this subscriber asked for.
    fn did_update_locations(&self, positions: &PositionBatch);

    /// Optional capability for general provider errors.
    fn error_receiver(&self) -> Option<&dyn LocationErrorReceiver> {
        None
    }
}

/// Receives general provider errors.
pub trait LocationErrorReceiver {
    /// Called with each provider error while `RECEIVE_ERRORS` is set.
    fn did_fail_with_error(&self, error: &ProviderError);
}

/// A consumer of region enter/exit events.
pub trait RegionSubscriber: Send + Sync {
    /// Namespace prefix for this subscriber's regions. Must satisfy the
    /// identifier grammar and be unique among registered region subscribers.
    fn subscriber_identifier(&self) -> &str;

    /// Regions this subscriber wants monitored, with local identifiers.
    fn monitored_regions(&self) -> Vec<Region>;

    /// Whether per-region monitoring errors should be forwarded.
    fn should_receive_region_monitoring_errors(&self) -> bool {
        false
    }

    /// Adds `region` to the subscriber's own declared set.
    ///
    /// Used to hand back regions the provider kept monitoring across a restart.
    fn add_monitored_region(&self, region: Region);

    /// The device entered `region` (local identifier).
    fn did_enter_region(&self, region: &Region);

    /// The device left `region` (local identifier).
    fn did_exit_region(&self, region: &Region);

    /// Optional capability for per-region errors.
    fn region_error_receiver(&self) -> Option<&dyn RegionErrorReceiver> {
        None
    }
}

/// Receives per-region monitoring errors.
pub trait RegionErrorReceiver {
    /// Monitoring `region` failed.
    fn monitoring_did_fail(&self, region: &Region, error: &ProviderError);
}

/// Reference identity of two subscriber handles.
pub(crate) fn same_subscriber<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording subscribers shared by unit tests.

    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    pub(crate) struct RecordingLocation {
        pub options: Mutex<SubscriberOptions>,
        pub accuracy: Mutex<Option<Accuracy>>,
        pub batches: Mutex<Vec<PositionBatch>>,
        pub errors: Mutex<Vec<ProviderError>>,
        pub handles_errors: bool,
    }

    impl RecordingLocation {
        pub(crate) fn new(options: SubscriberOptions, accuracy: Accuracy) -> Arc<Self> {
            Arc::new(Self {
                options: Mutex::new(options),
                accuracy: Mutex::new(Some(accuracy)),
                ..Self::default()
            })
        }

        pub(crate) fn with_errors(options: SubscriberOptions) -> Arc<Self> {
            Arc::new(Self {
                options: Mutex::new(options),
                handles_errors: true,
                ..Self::default()
            })
        }

        pub(crate) fn batch_count(&self) -> usize {
            self.batches.lock().unwrap().len()
        }
    }

    impl LocationSubscriber for RecordingLocation {
        fn location_subscriber_options(&self) -> SubscriberOptions {
            *self.options.lock().unwrap()
        }

        fn desired_accuracy(&self) -> Accuracy {
            self.accuracy.lock().unwrap().unwrap_or(Accuracy::THREE_KILOMETERS)
        }

        fn did_update_locations(&self, positions: &PositionBatch) {
            self.batches.lock().unwrap().push(Arc::clone(positions));
        }

        fn error_receiver(&self) -> Option<&dyn LocationErrorReceiver> {
            if self.handles_errors {
                Some(self)
            } else {
                None
            }
        }
    }

    impl LocationErrorReceiver for RecordingLocation {
        fn did_fail_with_error(&self, error: &ProviderError) {
            self.errors.lock().unwrap().push(error.clone());
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingRegion {
        pub identifier: String,
        pub regions: Mutex<Vec<Region>>,
        pub wants_errors: bool,
        pub handles_errors: bool,
        pub entered: Mutex<Vec<String>>,
        pub exited: Mutex<Vec<String>>,
        pub failed: Mutex<Vec<String>>,
        pub reattached: Mutex<Vec<String>>,
    }

    impl RecordingRegion {
        pub(crate) fn new(identifier: &str, regions: Vec<Region>) -> Arc<Self> {
            Arc::new(Self {
                identifier: identifier.to_string(),
                regions: Mutex::new(regions),
                ..Self::default()
            })
        }

        pub(crate) fn with_error_flags(identifier: &str, wants_errors: bool, handles_errors: bool) -> Arc<Self> {
            Arc::new(Self {
                identifier: identifier.to_string(),
                wants_errors,
                handles_errors,
                ..Self::default()
            })
        }
    }

    impl RegionSubscriber for RecordingRegion {
        fn subscriber_identifier(&self) -> &str {
            &self.identifier
        }

        fn monitored_regions(&self) -> Vec<Region> {
            self.regions.lock().unwrap().clone()
        }

        fn should_receive_region_monitoring_errors(&self) -> bool {
            self.wants_errors
        }

        fn add_monitored_region(&self, region: Region) {
            self.reattached.lock().unwrap().push(region.identifier.clone());
            self.regions.lock().unwrap().push(region);
        }

        fn did_enter_region(&self, region: &Region) {
            self.entered.lock().unwrap().push(region.identifier.clone());
        }

        fn did_exit_region(&self, region: &Region) {
            self.exited.lock().unwrap().push(region.identifier.clone());
        }

        fn region_error_receiver(&self) -> Option<&dyn RegionErrorReceiver> {
            if self.handles_errors {
                Some(self)
            } else {
                None
            }
        }
    }

    impl RegionErrorReceiver for RecordingRegion {
        fn monitoring_did_fail(&self, region: &Region, _error: &ProviderError) {
            self.failed.lock().unwrap().push(region.identifier.clone());
        }
    }
}
