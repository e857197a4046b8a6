use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::subscriber::{same_subscriber, AppState, LocationSubscriberRef, RegionSubscriberRef};

/// Immutable point-in-time view of both subscriber sets.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    location: Vec<LocationSubscriberRef>,
    region: Vec<RegionSubscriberRef>,
}

impl RegistrySnapshot {
    pub(crate) fn new(location: Vec<LocationSubscriberRef>, region: Vec<RegionSubscriberRef>) -> Self {
        Self { location, region }
    }

    /// Location subscribers in registration order.
    #[must_use]
    pub fn location_subscribers(&self) -> &[LocationSubscriberRef] {
        &self.location
    }

    /// Region subscribers in registration order.
    #[must_use]
    pub fn region_subscribers(&self) -> &[RegionSubscriberRef] {
        &self.region
    }

    /// Location subscribers taking part while the application is in `state`.
    ///
    /// Options are read once per subscriber per call.
    pub fn active_location_subscribers(
        &self,
        state: AppState,
    ) -> impl Iterator<Item = &LocationSubscriberRef> + '_ {
        self.location
            .iter()
            .filter(move |s| s.location_subscriber_options().is_active_in(state))
    }

    /// True if this exact handle is registered.
    #[must_use]
    pub fn contains_location(&self, subscriber: &LocationSubscriberRef) -> bool {
        self.location.iter().any(|s| same_subscriber(s, subscriber))
    }

    /// True if this exact handle is registered.
    #[must_use]
    pub fn contains_region(&self, subscriber: &RegionSubscriberRef) -> bool {
        self.region.iter().any(|s| same_subscriber(s, subscriber))
    }

    /// The region subscriber owning `subscriber_identifier`, if registered.
    #[must_use]
    pub fn region_owner(&self, subscriber_identifier: &str) -> Option<&RegionSubscriberRef> {
        self.region
            .iter()
            .find(|s| s.subscriber_identifier() == subscriber_identifier)
    }

    /// True when both sets are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.location.is_empty() && self.region.is_empty()
    }
}

impl fmt::Debug for RegistrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let identifiers: Vec<&str> = self.region.iter().map(|s| s.subscriber_identifier()).collect();
        f.debug_struct("RegistrySnapshot")
            .field("location_subscribers", &self.location.len())
            .field("region_subscribers", &identifiers)
            .finish()
    }
}

/// Holder of the most recently published snapshot.
///
/// Writers replace the whole `Arc`; readers clone it. A reader may see a
/// snapshot that is one pending mutation behind, never a torn one.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl SnapshotCell {
    /// Latest published snapshot.
    #[must_use]
    pub fn load(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Publishes `snapshot`, returning the shared handle.
    pub fn store(&self, snapshot: RegistrySnapshot) -> Arc<RegistrySnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use crate::position::Accuracy;
    use crate::subscriber::testing::{RecordingLocation, RecordingRegion};
    use crate::subscriber::SubscriberOptions;

    use super::*;

    #[test]
    fn background_filter() {
        let fg: LocationSubscriberRef = RecordingLocation::new(SubscriberOptions::CONTINUOUS, Accuracy::BEST);
        let bg: LocationSubscriberRef = RecordingLocation::new(
            SubscriberOptions::CONTINUOUS | SubscriberOptions::RUN_IN_BACKGROUND,
            Accuracy::BEST,
        );
        let snap = RegistrySnapshot::new(vec![Arc::clone(&fg), Arc::clone(&bg)], vec![]);

        assert_eq!(snap.active_location_subscribers(AppState::Foreground).count(), 2);

        let background: Vec<_> = snap.active_location_subscribers(AppState::Background).collect();
        assert_eq!(background.len(), 1);
        assert!(same_subscriber(background[0], &bg));
    }

    #[test]
    fn owner_lookup() {
        let owner: RegionSubscriberRef = RecordingRegion::new("geo", vec![]);
        let snap = RegistrySnapshot::new(vec![], vec![Arc::clone(&owner)]);
        assert!(snap.region_owner("geo").is_some());
        assert!(snap.region_owner("other").is_none());
        assert!(snap.contains_region(&owner));
    }

    #[test]
    fn cell_publishes_whole_snapshots() {
        let cell = SnapshotCell::default();
        assert!(cell.load().is_empty());

        let owner: RegionSubscriberRef = RecordingRegion::new("geo", vec![]);
        let before = cell.load();
        cell.store(RegistrySnapshot::new(vec![], vec![owner]));

        assert!(before.is_empty());
        assert_eq!(cell.load().region_subscribers().len(), 1);
    }
}
