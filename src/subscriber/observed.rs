//! Subscriber-owned state that tells the broker when it changes.
//!
//! The broker never polls subscribers. After a subscriber changes what it
//! declares, a refresh has to run before the next event is dispatched. These
//! helpers make that automatic: every mutation that changes the value
//! enqueues the matching refresh through an attached [`RefreshHandle`].
//! Subscribers that keep their own state call
//! `refresh_location_subscribers`/`refresh_region_subscribers` instead.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::broker::RefreshHandle;
use crate::position::Accuracy;
use crate::region::Region;

use super::options::SubscriberOptions;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy)]
struct Demand {
    options: SubscriberOptions,
    accuracy: Accuracy,
}

/// Options and accuracy for a location subscriber.
#[derive(Debug)]
pub struct ObservedLocationDemand {
    demand: RwLock<Demand>,
    notifier: RwLock<Option<RefreshHandle>>,
}

impl ObservedLocationDemand {
    /// Creates detached state; attach a handle to start notifying.
    #[must_use]
    pub fn new(options: SubscriberOptions, accuracy: Accuracy) -> Self {
        Self {
            demand: RwLock::new(Demand { options, accuracy }),
            notifier: RwLock::new(None),
        }
    }

    /// Routes future change notifications to `handle`.
    pub fn attach(&self, handle: RefreshHandle) {
        *write(&self.notifier) = Some(handle);
    }

    /// Stops change notifications.
    pub fn detach(&self) {
        *write(&self.notifier) = None;
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> SubscriberOptions {
        read(&self.demand).options
    }

    /// Current desired accuracy.
    #[must_use]
    pub fn desired_accuracy(&self) -> Accuracy {
        read(&self.demand).accuracy
    }

    /// Replaces the options. Notifies only on change.
    pub fn set_options(&self, options: SubscriberOptions) {
        self.update(|d| d.options = options);
    }

    /// Replaces the desired accuracy. Notifies only on change.
    pub fn set_desired_accuracy(&self, accuracy: Accuracy) {
        self.update(|d| d.accuracy = accuracy);
    }

    /// Replaces both values with a single notification.
    pub fn set(&self, options: SubscriberOptions, accuracy: Accuracy) {
        self.update(|d| {
            d.options = options;
            d.accuracy = accuracy;
        });
    }

    fn update(&self, f: impl FnOnce(&mut Demand)) {
        let changed = {
            let mut demand = write(&self.demand);
            let before = *demand;
            f(&mut demand);
            before.options != demand.options || before.accuracy != demand.accuracy
        };

        if changed {
            if let Some(handle) = read(&self.notifier).as_ref() {
                handle.refresh_location_subscribers();
            }
        }
    }
}

/// The declared region set of a region subscriber.
///
/// Regions are keyed by their local identifier; inserting a region with an
/// existing identifier replaces it.
#[derive(Debug, Default)]
pub struct ObservedRegionSet {
    regions: RwLock<Vec<Region>>,
    notifier: RwLock<Option<RefreshHandle>>,
}

impl ObservedRegionSet {
    /// Creates an empty, detached set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached set seeded with `regions`.
    #[must_use]
    pub fn with_regions(regions: impl IntoIterator<Item = Region>) -> Self {
        let set = Self::new();
        {
            let mut guard = write(&set.regions);
            for region in regions {
                upsert(&mut guard, region);
            }
        }
        set
    }

    /// Routes future change notifications to `handle`.
    pub fn attach(&self, handle: RefreshHandle) {
        *write(&self.notifier) = Some(handle);
    }

    /// Stops change notifications.
    pub fn detach(&self) {
        *write(&self.notifier) = None;
    }

    /// Copy of the declared regions.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Region> {
        read(&self.regions).clone()
    }

    /// True if a region with `identifier` is declared.
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        read(&self.regions).iter().any(|r| r.identifier == identifier)
    }

    /// Number of declared regions.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.regions).len()
    }

    /// True when no region is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.regions).is_empty()
    }

    /// Adds or replaces a region.
    pub fn insert(&self, region: Region) {
        let changed = upsert(&mut write(&self.regions), region);
        if changed {
            self.notify();
        }
    }

    /// Removes the region with `identifier`. Returns whether one was removed.
    pub fn remove(&self, identifier: &str) -> bool {
        let removed = {
            let mut regions = write(&self.regions);
            let before = regions.len();
            regions.retain(|r| r.identifier != identifier);
            regions.len() != before
        };
        if removed {
            self.notify();
        }
        removed
    }

    /// Replaces the whole set.
    pub fn replace(&self, regions: impl IntoIterator<Item = Region>) {
        {
            let mut guard = write(&self.regions);
            guard.clear();
            for region in regions {
                upsert(&mut guard, region);
            }
        }
        self.notify();
    }

    /// Removes every region.
    pub fn clear(&self) {
        let had_any = {
            let mut regions = write(&self.regions);
            let had_any = !regions.is_empty();
            regions.clear();
            had_any
        };
        if had_any {
            self.notify();
        }
    }

    fn notify(&self) {
        if let Some(handle) = read(&self.notifier).as_ref() {
            handle.refresh_region_subscribers();
        }
    }
}

fn upsert(regions: &mut Vec<Region>, region: Region) -> bool {
    match regions.iter_mut().find(|r| r.identifier == region.identifier) {
        Some(existing) if *existing == region => false,
        Some(existing) => {
            *existing = region;
            true
        }
        None => {
            regions.push(region);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::position::Coordinate;

    use super::*;

    fn region(id: &str) -> Region {
        Region::circle(id, Coordinate::new(0.0, 0.0), 100.0)
    }

    #[test]
    fn demand_setters() {
        let demand = ObservedLocationDemand::new(SubscriberOptions::NONE, Accuracy::KILOMETER);
        demand.set_options(SubscriberOptions::CONTINUOUS);
        demand.set_desired_accuracy(Accuracy::BEST);
        assert_eq!(demand.options(), SubscriberOptions::CONTINUOUS);
        assert_eq!(demand.desired_accuracy(), Accuracy::BEST);
    }

    #[test]
    fn region_set_upserts_by_identifier() {
        let set = ObservedRegionSet::with_regions([region("a"), region("b")]);
        assert_eq!(set.len(), 2);

        let mut wider = region("a");
        wider.notify_on_exit = false;
        set.insert(wider.clone());
        assert_eq!(set.len(), 2);
        assert_eq!(set.snapshot()[0], wider);

        assert!(set.remove("b"));
        assert!(!set.remove("b"));
        assert!(set.contains("a"));

        set.clear();
        assert!(set.is_empty());
    }
}
