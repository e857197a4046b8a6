//! Subscriber registry.
//!
//! The live sets are owned by the broker worker and mutated only there. After
//! every mutation the worker publishes an immutable [`RegistrySnapshot`];
//! readers on any thread get a cheap `Arc` clone of the latest one and never
//! see the live sets.
//!
//! Both sets keep insertion order so that iteration (and therefore delivery
//! order) is deterministic.

/// Immutable snapshot and its publication cell.
pub mod snapshot;

pub use snapshot::{RegistrySnapshot, SnapshotCell};

use crate::region::validate_identifier;
use crate::subscriber::{same_subscriber, LocationSubscriberRef, RegionSubscriberRef};

/// Outcome of adding a region subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionAdd {
    /// Inserted.
    Added,
    /// Already registered (same handle).
    AlreadyPresent,
    /// Another subscriber already uses this identifier.
    IdentifierTaken(String),
    /// The identifier violates the grammar.
    InvalidIdentifier(String),
}

/// The live subscriber sets.
#[derive(Default)]
pub struct SubscriberRegistry {
    location: Vec<LocationSubscriberRef>,
    region: Vec<RegionSubscriberRef>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a location subscriber. Returns false if it was already present.
    pub fn add_location(&mut self, subscriber: LocationSubscriberRef) -> bool {
        if self.location.iter().any(|s| same_subscriber(s, &subscriber)) {
            return false;
        }
        self.location.push(subscriber);
        true
    }

    /// Removes a location subscriber. Returns false if it was absent.
    pub fn remove_location(&mut self, subscriber: &LocationSubscriberRef) -> bool {
        let before = self.location.len();
        self.location.retain(|s| !same_subscriber(s, subscriber));
        self.location.len() != before
    }

    /// Adds a region subscriber after checking its identifier.
    pub fn add_region(&mut self, subscriber: RegionSubscriberRef) -> RegionAdd {
        if self.region.iter().any(|s| same_subscriber(s, &subscriber)) {
            return RegionAdd::AlreadyPresent;
        }

        let identifier = subscriber.subscriber_identifier().to_string();
        if validate_identifier("subscriber_identifier", &identifier).is_err() {
            return RegionAdd::InvalidIdentifier(identifier);
        }
        if self.region.iter().any(|s| s.subscriber_identifier() == identifier) {
            return RegionAdd::IdentifierTaken(identifier);
        }

        self.region.push(subscriber);
        RegionAdd::Added
    }

    /// Removes a region subscriber. Returns false if it was absent.
    pub fn remove_region(&mut self, subscriber: &RegionSubscriberRef) -> bool {
        let before = self.region.len();
        self.region.retain(|s| !same_subscriber(s, subscriber));
        self.region.len() != before
    }

    /// Removes every subscriber of both kinds.
    pub fn clear(&mut self) {
        self.location.clear();
        self.region.clear();
    }

    /// Number of location subscribers.
    #[must_use]
    pub fn location_len(&self) -> usize {
        self.location.len()
    }

    /// Number of region subscribers.
    #[must_use]
    pub fn region_len(&self) -> usize {
        self.region.len()
    }

    /// Point-in-time copy of both sets.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::new(self.location.clone(), self.region.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use crate::position::Accuracy;
    use crate::subscriber::testing::{RecordingLocation, RecordingRegion};
    use crate::subscriber::SubscriberOptions;

    use super::*;

    fn location() -> LocationSubscriberRef {
        RecordingLocation::new(SubscriberOptions::CONTINUOUS, Accuracy::BEST)
    }

    #[test]
    fn duplicate_add_and_absent_remove_are_noops() {
        let mut registry = SubscriberRegistry::new();
        let a = location();

        assert!(registry.add_location(Arc::clone(&a)));
        assert!(!registry.add_location(Arc::clone(&a)));
        assert_eq!(registry.location_len(), 1);

        assert!(registry.remove_location(&a));
        assert!(!registry.remove_location(&a));
        assert_eq!(registry.location_len(), 0);
    }

    #[test]
    fn region_identifier_checks() {
        let mut registry = SubscriberRegistry::new();
        let first: RegionSubscriberRef = RecordingRegion::new("venues", vec![]);
        let clash: RegionSubscriberRef = RecordingRegion::new("venues", vec![]);
        let bad: RegionSubscriberRef = RecordingRegion::new("9venues", vec![]);

        assert_eq!(registry.add_region(Arc::clone(&first)), RegionAdd::Added);
        assert_eq!(registry.add_region(Arc::clone(&first)), RegionAdd::AlreadyPresent);
        assert_eq!(
            registry.add_region(clash),
            RegionAdd::IdentifierTaken("venues".to_string())
        );
        assert_eq!(
            registry.add_region(bad),
            RegionAdd::InvalidIdentifier("9venues".to_string())
        );
        assert_eq!(registry.region_len(), 1);
    }

    #[test]
    fn snapshot_is_detached_from_live_sets() {
        let mut registry = SubscriberRegistry::new();
        let a = location();
        registry.add_location(Arc::clone(&a));

        let snap = registry.snapshot();
        registry.clear();

        assert_eq!(snap.location_subscribers().len(), 1);
        assert_eq!(registry.location_len(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(usize),
        Remove(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(0usize..6).prop_map(Op::Add), (0usize..6).prop_map(Op::Remove)]
    }

    proptest! {
        #[test]
        fn replay_matches_set_semantics(ops in proptest::collection::vec(op(), 0..64)) {
            let pool: Vec<LocationSubscriberRef> = (0..6).map(|_| location()).collect();
            let mut registry = SubscriberRegistry::new();
            let mut model: Vec<usize> = Vec::new();

            for op in ops {
                match op {
                    Op::Add(i) => {
                        let inserted = registry.add_location(Arc::clone(&pool[i]));
                        prop_assert_eq!(inserted, !model.contains(&i));
                        if inserted {
                            model.push(i);
                        }
                    }
                    Op::Remove(i) => {
                        let removed = registry.remove_location(&pool[i]);
                        prop_assert_eq!(removed, model.contains(&i));
                        model.retain(|m| *m != i);
                    }
                }
            }

            let snap = registry.snapshot();
            prop_assert_eq!(snap.location_subscribers().len(), model.len());
            for (held, expected) in snap.location_subscribers().iter().zip(model.iter()) {
                prop_assert!(same_subscriber(held, &pool[*expected]));
            }
        }
    }
}
