//! Location broker.
//!
//! [`LocationBroker`] multiplexes one location provider among any number of
//! location and region subscribers. It owns a dedicated worker thread; every
//! mutation, refresh, lifecycle change and provider callback is queued to that
//! thread and processed strictly in order. Public methods never wait on the
//! provider, and return as soon as the work is queued.
//!
//! Use [`LocationBroker::sync`] to wait until everything queued so far has
//! been processed.

mod config;
mod hooks;
mod sink;
mod state;
mod status;
mod worker;

pub use config::BrokerConfig;
pub use hooks::{BrokerHooks, NoopHooks};
pub use sink::{EventSink, RefreshHandle};
pub use status::BrokerStatus;

use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};

use crate::error::{BrokerResult, ExecutionError};
use crate::position::{Accuracy, Position};
use crate::provider::{AuthorizationStatus, LocationProvider};
use crate::registry::RegistrySnapshot;
use crate::resolver::ServiceConfig;
use crate::subscriber::{AppState, LocationSubscriberRef, RegionSubscriberRef};

use state::{read, BrokerState, Command, Counters};
use worker::{worker_loop, Worker};

/// Builder for [`LocationBroker`].
pub struct BrokerBuilder {
    provider: Arc<dyn LocationProvider>,
    config: BrokerConfig,
    hooks: Arc<dyn BrokerHooks>,
    location: Vec<LocationSubscriberRef>,
    region: Vec<RegionSubscriberRef>,
}

impl BrokerBuilder {
    /// Starts a builder around `provider` with default configuration.
    #[must_use]
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self {
            provider,
            config: BrokerConfig::default(),
            hooks: Arc::new(NoopHooks),
            location: Vec::new(),
            region: Vec::new(),
        }
    }

    /// Replaces the default configuration.
    #[must_use]
    pub fn config(mut self, config: BrokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs extension hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn BrokerHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Registers a location subscriber before the broker starts.
    #[must_use]
    pub fn location_subscriber(mut self, subscriber: LocationSubscriberRef) -> Self {
        self.location.push(subscriber);
        self
    }

    /// Registers a region subscriber before the startup reconcile, so regions
    /// the provider kept from an earlier run are handed back to it.
    #[must_use]
    pub fn region_subscriber(mut self, subscriber: RegionSubscriberRef) -> Self {
        self.region.push(subscriber);
        self
    }

    /// Spawns the worker and returns the broker.
    ///
    /// Startup (seeding `current_location`, registering the initial
    /// subscribers, the first refresh of both kinds) runs on the worker
    /// before anything queued through the returned handle.
    #[must_use]
    pub fn build(self) -> LocationBroker {
        let Self {
            provider,
            config,
            hooks,
            location,
            region,
        } = self;

        let (tx, rx) = bounded::<Command>(config.queue_capacity.max(1));
        let state = Arc::new(BrokerState::new(tx));

        let worker = Worker::new(Arc::clone(&provider), hooks, Arc::clone(&state));
        let thread_config = config.clone();
        let join = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker_loop(worker, thread_config, location, region, rx))
            .expect("failed to spawn locbroker worker");

        LocationBroker {
            provider,
            config,
            state,
            join: Mutex::new(Some(join)),
        }
    }
}

impl fmt::Debug for BrokerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerBuilder")
            .field("config", &self.config)
            .field("location_subscribers", &self.location.len())
            .field("region_subscribers", &self.region.len())
            .finish_non_exhaustive()
    }
}

/// Multiplexes one location provider among many subscribers.
pub struct LocationBroker {
    provider: Arc<dyn LocationProvider>,
    config: BrokerConfig,
    state: Arc<BrokerState>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl LocationBroker {
    /// Builds a broker with default configuration and no hooks.
    #[must_use]
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        BrokerBuilder::new(provider).build()
    }

    /// Starts a [`BrokerBuilder`].
    #[must_use]
    pub fn builder(provider: Arc<dyn LocationProvider>) -> BrokerBuilder {
        BrokerBuilder::new(provider)
    }

    fn submit(&self, command: Command, path: &'static str) {
        if !self.state.submit(command) {
            tracing::warn!(path, "broker worker is gone; dropping operation");
        }
    }

    /// Registers a location subscriber. Adding one that is already registered
    /// does nothing.
    pub fn add_location_subscriber(&self, subscriber: LocationSubscriberRef) {
        self.submit(Command::AddLocation(subscriber), "add_location_subscriber");
    }

    /// Unregisters a location subscriber. Removing one that is not registered
    /// does nothing.
    pub fn remove_location_subscriber(&self, subscriber: &LocationSubscriberRef) {
        self.submit(
            Command::RemoveLocation(Arc::clone(subscriber)),
            "remove_location_subscriber",
        );
    }

    /// Registers a region subscriber.
    ///
    /// A subscriber whose identifier is malformed or already used by another
    /// registered subscriber is rejected and logged.
    pub fn add_region_subscriber(&self, subscriber: RegionSubscriberRef) {
        self.submit(Command::AddRegion(subscriber), "add_region_subscriber");
    }

    /// Unregisters a region subscriber. Its regions stop being monitored.
    pub fn remove_region_subscriber(&self, subscriber: &RegionSubscriberRef) {
        self.submit(
            Command::RemoveRegion(Arc::clone(subscriber)),
            "remove_region_subscriber",
        );
    }

    /// Re-reads every location subscriber's options and accuracy and applies
    /// the result to the provider.
    pub fn refresh_location_subscribers(&self) {
        self.submit(Command::RefreshLocations, "refresh_location_subscribers");
    }

    /// Re-reads every region subscriber's declared regions and reconciles
    /// them with the provider.
    pub fn refresh_region_subscribers(&self) {
        self.submit(Command::RefreshRegions, "refresh_region_subscribers");
    }

    /// Removes every subscriber and turns all provider services off.
    pub fn remove_all_subscribers(&self) {
        self.submit(Command::RemoveAll, "remove_all_subscribers");
    }

    /// Restricts resolution and delivery to `RUN_IN_BACKGROUND` subscribers.
    pub fn application_did_enter_background(&self) {
        self.submit(Command::SetAppState(AppState::Background), "application_did_enter_background");
    }

    /// Reopens resolution and delivery to every subscriber.
    pub fn application_will_enter_foreground(&self) {
        self.submit(Command::SetAppState(AppState::Foreground), "application_will_enter_foreground");
    }

    /// Registered location subscribers, as of the last processed mutation.
    #[must_use]
    pub fn location_subscribers(&self) -> Vec<LocationSubscriberRef> {
        self.snapshot().location_subscribers().to_vec()
    }

    /// Registered region subscribers, as of the last processed mutation.
    #[must_use]
    pub fn region_subscribers(&self) -> Vec<RegionSubscriberRef> {
        self.snapshot().region_subscribers().to_vec()
    }

    /// Latest published registry snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.state.published.snapshot.load()
    }

    /// Last position seen, from a batch or the provider's last known fix.
    #[must_use]
    pub fn current_location(&self) -> Option<Position> {
        read(&self.state.published.current_location)
    }

    /// Last accuracy sent to the provider.
    #[must_use]
    pub fn current_accuracy(&self) -> Option<Accuracy> {
        read(&self.state.published.current_accuracy)
    }

    /// Services the provider was last told to run.
    #[must_use]
    pub fn service_config(&self) -> ServiceConfig {
        read(&self.state.published.service)
    }

    /// Lifecycle state the broker is currently filtering by.
    #[must_use]
    pub fn app_state(&self) -> AppState {
        read(&self.state.published.app_state)
    }

    /// Authorization state, read from the provider.
    #[must_use]
    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.provider.authorization_status()
    }

    /// True if location services are authorized in either mode.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.authorization_status().is_authorized()
    }

    /// Callback surface to hand to the provider.
    #[must_use]
    pub fn event_sink(&self) -> EventSink {
        EventSink::new(&self.state)
    }

    /// Handle subscriber state can use to request refreshes.
    #[must_use]
    pub fn refresh_handle(&self) -> RefreshHandle {
        RefreshHandle::new(&self.state)
    }

    /// Configuration the broker was built with.
    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Waits until everything queued before this call has been processed,
    /// using the configured `sync_timeout`.
    pub fn sync(&self) -> BrokerResult<()> {
        self.sync_timeout(self.config.sync_timeout)
    }

    /// Waits up to `timeout` until everything queued before this call has
    /// been processed.
    ///
    /// Called from the worker itself (inside a subscriber callback or hook),
    /// this returns immediately; waiting there could never finish.
    pub fn sync_timeout(&self, timeout: Duration) -> BrokerResult<()> {
        if self.state.on_worker_thread() {
            return Ok(());
        }

        let (reply_tx, reply_rx) = bounded::<()>(1);
        if !self.state.submit(Command::Barrier { reply: reply_tx }) {
            return Err(ExecutionError::Disconnected { path: "broker_barrier" }.into());
        }

        reply_rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => ExecutionError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }
            .into(),
            RecvTimeoutError::Disconnected => ExecutionError::Disconnected { path: "broker_barrier" }.into(),
        })
    }

    /// Diagnostic counters and the current published state.
    #[must_use]
    pub fn status(&self) -> BrokerStatus {
        let snapshot = self.snapshot();
        let counters = &self.state.counters;
        BrokerStatus {
            location_subscribers: snapshot.location_subscribers().len(),
            region_subscribers: snapshot.region_subscribers().len(),
            app_state: self.app_state(),
            service: self.service_config(),
            current_accuracy: self.current_accuracy(),
            dropped_events: Counters::get(&counters.dropped_events),
            dropped_region_events: Counters::get(&counters.dropped_region_events),
            rejected_regions: Counters::get(&counters.rejected_regions),
            rejected_subscribers: Counters::get(&counters.rejected_subscribers),
        }
    }
}

impl fmt::Debug for LocationBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationBroker")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Drop for LocationBroker {
    fn drop(&mut self) {
        // Sinks and refresh handles keep the queue open, so the worker is told
        // to stop explicitly. It finishes everything queued before this.
        let _ = self.state.submit(Command::Shutdown);

        if let Ok(mut guard) = self.join.lock() {
            // Detached, not joined: a subscriber callback may be what dropped
            // the last handle, and joining from the worker would deadlock.
            drop(guard.take());
        }
    }
}
