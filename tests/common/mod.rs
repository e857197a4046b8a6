#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use chrono::{TimeZone, Utc};

use locbroker::{
    Accuracy, Coordinate, LocationErrorReceiver, LocationSubscriber, ObservedLocationDemand,
    ObservedRegionSet, Position, PositionBatch, ProviderError, Region, RegionErrorReceiver,
    RegionSubscriber, SubscriberOptions,
};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A fix with a fixed timestamp, so equal inputs compare equal.
pub fn fix(lat: f64, lon: f64) -> Position {
    let timestamp = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    Position::new(Coordinate::new(lat, lon), 5.0).at(timestamp)
}

pub fn circle(identifier: &str) -> Region {
    Region::circle(identifier, Coordinate::new(52.52, 13.40), 150.0)
}

/// Location subscriber backed by [`ObservedLocationDemand`].
pub struct Tracker {
    pub demand: ObservedLocationDemand,
    pub batches: Mutex<Vec<PositionBatch>>,
    pub errors: Mutex<Vec<ProviderError>>,
    pub handles_errors: bool,
}

impl Tracker {
    pub fn new(options: SubscriberOptions, accuracy: Accuracy) -> Arc<Self> {
        Arc::new(Self {
            demand: ObservedLocationDemand::new(options, accuracy),
            batches: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            handles_errors: false,
        })
    }

    pub fn with_errors(options: SubscriberOptions) -> Arc<Self> {
        Arc::new(Self {
            demand: ObservedLocationDemand::new(options, Accuracy::KILOMETER),
            batches: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            handles_errors: true,
        })
    }

    pub fn batches(&self) -> Vec<PositionBatch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl LocationSubscriber for Tracker {
    fn location_subscriber_options(&self) -> SubscriberOptions {
        self.demand.options()
    }

    fn desired_accuracy(&self) -> Accuracy {
        self.demand.desired_accuracy()
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

impl LocationErrorReceiver for Tracker {
    fn did_fail_with_error(&self, error: &ProviderError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

/// Region subscriber backed by [`ObservedRegionSet`].
pub struct Fence {
    pub identifier: String,
    pub regions: ObservedRegionSet,
    pub wants_errors: bool,
    pub handles_errors: bool,
    pub events: Mutex<Vec<String>>,
}

impl Fence {
    pub fn new(identifier: &str, regions: Vec<Region>) -> Arc<Self> {
        Arc::new(Self {
            identifier: identifier.to_string(),
            regions: ObservedRegionSet::with_regions(regions),
            wants_errors: false,
            handles_errors: false,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn with_error_flags(identifier: &str, regions: Vec<Region>, wants: bool, handles: bool) -> Arc<Self> {
        Arc::new(Self {
            identifier: identifier.to_string(),
            regions: ObservedRegionSet::with_regions(regions),
            wants_errors: wants,
            handles_errors: handles,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl RegionSubscriber for Fence {
    fn subscriber_identifier(&self) -> &str {
        &self.identifier
    }

    fn monitored_regions(&self) -> Vec<Region> {
        self.regions.snapshot()
    }

    fn should_receive_region_monitoring_errors(&self) -> bool {
        self.wants_errors
    }

    fn add_monitored_region(&self, region: Region) {
        self.events.lock().unwrap().push(format!("reattach:{}", region.identifier));
        self.regions.insert(region);
    }

    fn did_enter_region(&self, region: &Region) {
        self.events.lock().unwrap().push(format!("enter:{}", region.identifier));
    }

    fn did_exit_region(&self, region: &Region) {
        self.events.lock().unwrap().push(format!("exit:{}", region.identifier));
    }

    fn region_error_receiver(&self) -> Option<&dyn RegionErrorReceiver> {
        if self.handles_errors {
            Some(self)
        } else {
            None
        }
    }
}

impl RegionErrorReceiver for Fence {
    fn monitoring_did_fail(&self, region: &Region, _error: &ProviderError) {
        self.events.lock().unwrap().push(format!("error:{}", region.identifier));
    }
}
