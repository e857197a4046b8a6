//! Event router.
//!
//! Fans provider callbacks out to the subscribers that asked for them. Routing
//! reads the registry snapshot current at delivery time, so a subscriber
//! removed before an event is dispatched never sees it.
//!
//! Inclusion rules:
//! - position batches go to active location subscribers with `CONTINUOUS`,
//!   `SIGNIFICANT_CHANGE` or `RECEIVE_ALL_LOCATIONS`;
//! - general errors go to active location subscribers with `RECEIVE_ERRORS`
//!   that expose an error receiver;
//! - region enter/exit go to the owning region subscriber; region errors only
//!   if it opted in and exposes a region error receiver.
//!
//! "Active" means foreground, or carrying `RUN_IN_BACKGROUND` while the
//! application is backgrounded. Region subscribers are not filtered by
//! lifecycle state.

use crate::position::PositionBatch;
use crate::provider::ProviderError;
use crate::region::{NamespacedId, Region};
use crate::registry::RegistrySnapshot;
use crate::subscriber::{AppState, SubscriberOptions};

/// Which region callback to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionTransition {
    /// Entered the region.
    Enter,
    /// Left the region.
    Exit,
}

/// What happened to a region event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionDelivery {
    /// Delivered to the owner.
    Delivered,
    /// Owner found, but it did not ask for this kind of event.
    Suppressed,
    /// The identifier is not in namespaced form.
    Unparseable,
    /// No registered subscriber owns the identifier.
    Unowned(String),
}

impl RegionDelivery {
    /// True when the event had to be dropped for lack of an owner.
    #[must_use]
    pub const fn is_dropped(&self) -> bool {
        matches!(self, Self::Unparseable | Self::Unowned(_))
    }
}

/// Delivers `batch` to every interested subscriber. Returns the delivery count.
pub fn route_positions(snapshot: &RegistrySnapshot, state: AppState, batch: &PositionBatch) -> usize {
    let mut delivered = 0;
    for subscriber in snapshot.location_subscribers() {
        let options = subscriber.location_subscriber_options();
        if options.wants_locations() && options.is_active_in(state) {
            subscriber.did_update_locations(batch);
            delivered += 1;
        }
    }
    delivered
}

/// Delivers a general provider error. Returns the delivery count.
pub fn route_error(snapshot: &RegistrySnapshot, state: AppState, error: &ProviderError) -> usize {
    let mut delivered = 0;
    for subscriber in snapshot.location_subscribers() {
        let options = subscriber.location_subscriber_options();
        if !options.contains(SubscriberOptions::RECEIVE_ERRORS) || !options.is_active_in(state) {
            continue;
        }
        if let Some(receiver) = subscriber.error_receiver() {
            receiver.did_fail_with_error(error);
            delivered += 1;
        }
    }
    delivered
}

/// Delivers an enter or exit for the provider-side `region`.
pub fn route_region_transition(
    snapshot: &RegistrySnapshot,
    region: &Region,
    transition: RegionTransition,
) -> RegionDelivery {
    let id = match NamespacedId::parse(&region.identifier) {
        Ok(id) => id,
        Err(_) => return RegionDelivery::Unparseable,
    };
    let Some(owner) = snapshot.region_owner(id.subscriber()) else {
        return RegionDelivery::Unowned(id.subscriber().to_string());
    };

    let local = region.with_identifier(id.region());
    match transition {
        RegionTransition::Enter => owner.did_enter_region(&local),
        RegionTransition::Exit => owner.did_exit_region(&local),
    }
    RegionDelivery::Delivered
}

/// Delivers a per-region monitoring error for the provider-side `region`.
pub fn route_region_error(
    snapshot: &RegistrySnapshot,
    region: &Region,
    error: &ProviderError,
) -> RegionDelivery {
    let id = match NamespacedId::parse(&region.identifier) {
        Ok(id) => id,
        Err(_) => return RegionDelivery::Unparseable,
    };
    let Some(owner) = snapshot.region_owner(id.subscriber()) else {
        return RegionDelivery::Unowned(id.subscriber().to_string());
    };

    if !owner.should_receive_region_monitoring_errors() {
        return RegionDelivery::Suppressed;
    }
    let Some(receiver) = owner.region_error_receiver() else {
        return RegionDelivery::Suppressed;
    };

    receiver.monitoring_did_fail(&region.with_identifier(id.region()), error);
    RegionDelivery::Delivered
}
