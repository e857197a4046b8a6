//! The broker's serial execution context.
//!
//! One thread owns the live registry, the last applied provider configuration
//! and the lifecycle state. Everything that reads or changes them arrives as a
//! [`Command`] on one FIFO queue, so registry mutations, refresh passes and
//! event dispatch never interleave.
//!
//! Before each command the worker runs any pending refresh, which is what
//! guarantees that a declared-state change is resolved before the next event
//! is routed.

use std::collections::HashSet;
use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::position::PositionBatch;
use crate::provider::{LocationProvider, ProviderEvent};
use crate::reconcile;
use crate::registry::{RegionAdd, RegistrySnapshot, SubscriberRegistry};
use crate::resolver::{self, AppliedConfig};
use crate::router::{self, RegionDelivery, RegionTransition};
use crate::subscriber::{AppState, LocationSubscriberRef, RegionSubscriberRef};

use super::config::BrokerConfig;
use super::hooks::BrokerHooks;
use super::state::{write, BrokerState, Command, Counters, RefreshKind};

pub(crate) struct Worker {
    provider: Arc<dyn LocationProvider>,
    hooks: Arc<dyn BrokerHooks>,
    state: Arc<BrokerState>,
    registry: SubscriberRegistry,
    snapshot: Arc<RegistrySnapshot>,
    applied: AppliedConfig,
    app_state: AppState,
    recovering: HashSet<String>,
    // (owner, local id) of declared regions already counted as rejected.
    rejected_regions: HashSet<(String, String)>,
}

impl Worker {
    pub(crate) fn new(
        provider: Arc<dyn LocationProvider>,
        hooks: Arc<dyn BrokerHooks>,
        state: Arc<BrokerState>,
    ) -> Self {
        Self {
            provider,
            hooks,
            state,
            registry: SubscriberRegistry::new(),
            snapshot: Arc::new(RegistrySnapshot::default()),
            applied: AppliedConfig::default(),
            app_state: AppState::Foreground,
            recovering: HashSet::new(),
            rejected_regions: HashSet::new(),
        }
    }

    /// Registers the initial subscribers and converges with the provider.
    ///
    /// Region subscribers registered here are still recovering during the
    /// startup reconcile, so regions the provider kept from a previous run are
    /// handed back instead of stopped.
    fn startup(
        &mut self,
        config: &BrokerConfig,
        location: Vec<LocationSubscriberRef>,
        region: Vec<RegionSubscriberRef>,
    ) {
        self.state.mark_worker_thread();

        if config.seed_current_location {
            if let Some(position) = self.provider.last_known_position() {
                write(&self.state.published.current_location, Some(position));
            }
        }

        for subscriber in location {
            self.registry.add_location(subscriber);
        }
        for subscriber in region {
            self.add_region(subscriber);
        }
        self.publish();

        self.refresh_locations();
        self.refresh_regions();
        // Reattached regions may have requested another pass.
        self.run_pending_refreshes();
        tracing::debug!(
            location_subscribers = self.registry.location_len(),
            region_subscribers = self.registry.region_len(),
            "broker worker started"
        );
    }

    fn publish(&mut self) {
        self.snapshot = self.state.published.snapshot.store(self.registry.snapshot());
    }

    fn run_pending_refreshes(&mut self) {
        if self.state.take_pending(RefreshKind::Locations) {
            self.refresh_locations();
        }
        if self.state.take_pending(RefreshKind::Regions) {
            self.refresh_regions();
        }
    }

    /// Processes one command plus everything it deferred.
    ///
    /// Returns false once a shutdown has been seen.
    fn process(&mut self, command: Command) -> bool {
        if matches!(command, Command::Shutdown) {
            return false;
        }
        self.run_pending_refreshes();
        self.handle(command);

        while let Some(deferred) = self.state.pop_deferred() {
            if matches!(deferred, Command::Shutdown) {
                return false;
            }
            self.run_pending_refreshes();
            self.handle(deferred);
        }
        self.run_pending_refreshes();
        true
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::AddLocation(subscriber) => {
                if self.registry.add_location(subscriber) {
                    self.publish();
                    self.refresh_locations();
                }
            }
            Command::RemoveLocation(subscriber) => {
                if self.registry.remove_location(&subscriber) {
                    self.publish();
                    self.refresh_locations();
                }
            }
            Command::AddRegion(subscriber) => {
                if self.add_region(subscriber) {
                    self.publish();
                    self.refresh_regions();
                }
            }
            Command::RemoveRegion(subscriber) => {
                let identifier = subscriber.subscriber_identifier().to_string();
                if self.registry.remove_region(&subscriber) {
                    self.recovering.remove(&identifier);
                    self.publish();
                    self.refresh_regions();
                }
            }
            Command::RefreshLocations => self.refresh_locations(),
            Command::RefreshRegions => self.refresh_regions(),
            Command::RemoveAll => self.remove_all(),
            Command::SetAppState(app_state) => {
                if app_state != self.app_state {
                    tracing::debug!(state = ?app_state, "application lifecycle changed");
                    self.app_state = app_state;
                    write(&self.state.published.app_state, app_state);
                    self.refresh_locations();
                }
            }
            Command::Provider(event) => self.dispatch(event),
            Command::Wake => {}
            Command::Barrier { reply } => {
                let _ = reply.send(());
            }
            Command::Shutdown => {}
        }
    }

    fn add_region(&mut self, subscriber: RegionSubscriberRef) -> bool {
        let identifier = subscriber.subscriber_identifier().to_string();
        match self.registry.add_region(subscriber) {
            RegionAdd::Added => {
                self.recovering.insert(identifier);
                true
            }
            RegionAdd::AlreadyPresent => false,
            RegionAdd::IdentifierTaken(identifier) => {
                tracing::warn!(subscriber = %identifier, "region subscriber identifier already registered");
                Counters::bump(&self.state.counters.rejected_subscribers);
                false
            }
            RegionAdd::InvalidIdentifier(identifier) => {
                tracing::error!(subscriber = %identifier, "rejected region subscriber with malformed identifier");
                Counters::bump(&self.state.counters.rejected_subscribers);
                false
            }
        }
    }

    fn refresh_locations(&mut self) {
        self.hooks.before_location_refresh(&self.snapshot);

        let target = resolver::resolve_location_config(
            self.snapshot.location_subscribers(),
            self.app_state,
        );
        let outcome = resolver::apply_service_config(self.provider.as_ref(), &mut self.applied, target);

        write(&self.state.published.service, self.applied.service);
        write(&self.state.published.current_accuracy, self.applied.requested_accuracy);

        self.hooks.after_location_refresh(&target, outcome.changed());
    }

    fn refresh_regions(&mut self) {
        self.hooks.before_region_refresh(&self.snapshot);

        let desired = resolver::resolve_desired_regions(self.snapshot.region_subscribers());
        let report = reconcile::reconcile(self.provider.as_ref(), &self.snapshot, &desired, &self.recovering);
        self.recovering.clear();
        self.note_rejected_regions(&desired);

        self.hooks.after_region_refresh(&report);
    }

    /// Counts each malformed declaration once, for as long as it stays declared.
    fn note_rejected_regions(&mut self, desired: &resolver::DesiredRegions) {
        let current: HashSet<(String, String)> = desired
            .rejected()
            .iter()
            .map(|r| (r.subscriber_identifier.clone(), r.region_identifier.clone()))
            .collect();
        let fresh = current.difference(&self.rejected_regions).count();
        self.rejected_regions = current;
        Counters::add(&self.state.counters.rejected_regions, fresh as u64);
    }

    fn remove_all(&mut self) {
        self.registry.clear();
        self.recovering.clear();
        self.state.clear_pending();
        self.publish();

        // An empty registry resolves to everything off and nothing monitored.
        self.refresh_locations();
        self.refresh_regions();
        tracing::debug!("removed all subscribers");
        self.hooks.after_remove_all();
    }

    fn dispatch(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::Positions(batch) => self.dispatch_positions(&batch),
            ProviderEvent::Error(error) => {
                let delivered = router::route_error(&self.snapshot, self.app_state, &error);
                tracing::debug!(error = %error, delivered, "routed provider error");
            }
            ProviderEvent::RegionEntered(region) => {
                let delivery = router::route_region_transition(&self.snapshot, &region, RegionTransition::Enter);
                self.note_region_delivery(&region.identifier, &delivery);
            }
            ProviderEvent::RegionExited(region) => {
                let delivery = router::route_region_transition(&self.snapshot, &region, RegionTransition::Exit);
                self.note_region_delivery(&region.identifier, &delivery);
            }
            ProviderEvent::RegionMonitoringFailed { region, error } => {
                let delivery = router::route_region_error(&self.snapshot, &region, &error);
                self.note_region_delivery(&region.identifier, &delivery);
            }
        }
    }

    fn dispatch_positions(&mut self, batch: &PositionBatch) {
        let Some(latest) = batch.last() else {
            tracing::debug!("ignoring empty position batch");
            return;
        };
        write(&self.state.published.current_location, Some(latest.clone()));

        let delivered = router::route_positions(&self.snapshot, self.app_state, batch);
        tracing::trace!(positions = batch.len(), delivered, "routed position batch");
    }

    fn note_region_delivery(&self, identifier: &str, delivery: &RegionDelivery) {
        match delivery {
            RegionDelivery::Delivered | RegionDelivery::Suppressed => {}
            RegionDelivery::Unparseable => {
                tracing::warn!(region = identifier, "dropping region event with unparseable identifier");
                Counters::bump(&self.state.counters.dropped_region_events);
            }
            RegionDelivery::Unowned(owner) => {
                tracing::warn!(region = identifier, owner = %owner, "dropping region event for unregistered subscriber");
                Counters::bump(&self.state.counters.dropped_region_events);
            }
        }
    }
}

pub(crate) fn worker_loop(
    mut worker: Worker,
    config: BrokerConfig,
    initial_location: Vec<LocationSubscriberRef>,
    initial_region: Vec<RegionSubscriberRef>,
    rx: Receiver<Command>,
) {
    worker.startup(&config, initial_location, initial_region);

    while let Ok(command) = rx.recv() {
        if !worker.process(command) {
            break;
        }
    }

    tracing::debug!("broker worker stopped");
}
