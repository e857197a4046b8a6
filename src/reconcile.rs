//! Region monitoring reconciler.
//!
//! Converges the provider's monitored regions (actual) with the regions the
//! registered subscribers declare (desired). Planning is pure; applying the
//! plan issues provider calls and reattachment callbacks.
//!
//! For every actual region:
//! - desired and identical: left alone;
//! - desired under the same identifier but changed (geometry or notify
//!   flags): started again, which replaces it on the provider;
//! - unparseable identifier, or owner not registered: stopped (orphan);
//! - owner registered and still recovering: handed back to the owner through
//!   `add_monitored_region` instead of being stopped;
//! - owner registered, past recovery, no longer declaring it: stopped.
//!
//! Every desired region missing from the actual set is started.
//!
//! An owner is "recovering" during the first reconcile pass after it was
//! registered. That is the window in which provider state that outlived the
//! process can be given back to it.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::provider::LocationProvider;
use crate::region::{NamespacedId, Region};
use crate::registry::RegistrySnapshot;
use crate::resolver::{DesiredRegion, DesiredRegions};

/// A provider-retained region to give back to its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Reattachment {
    /// Provider-side identifier; its subscriber half names the owner.
    pub id: NamespacedId,
    /// The region with its local identifier restored.
    pub region: Region,
}

/// Provider calls and callbacks needed to converge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Regions to start monitoring.
    pub start: Vec<DesiredRegion>,
    /// Provider-side identifiers to stop monitoring.
    pub stop: Vec<String>,
    /// Regions to hand back to their owners.
    pub reattach: Vec<Reattachment>,
}

impl ReconcilePlan {
    /// True when nothing needs to happen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.stop.is_empty() && self.reattach.is_empty()
    }
}

/// Computes the plan.
///
/// `live_owners` are the identifiers of registered region subscribers;
/// `recovering` is the subset still in their first pass.
pub fn plan(
    desired: &DesiredRegions,
    actual: &[Region],
    live_owners: &HashSet<&str>,
    recovering: &HashSet<String>,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();
    let mut actual_by_id: BTreeMap<&str, &Region> = BTreeMap::new();

    for region in actual {
        let identifier = region.identifier.as_str();
        if actual_by_id.insert(identifier, region).is_some() {
            continue;
        }
        if desired.contains(identifier) {
            continue;
        }

        let Ok(id) = NamespacedId::parse(identifier) else {
            plan.stop.push(identifier.to_string());
            continue;
        };

        if !live_owners.contains(id.subscriber()) {
            plan.stop.push(identifier.to_string());
        } else if recovering.contains(id.subscriber()) {
            plan.reattach.push(Reattachment {
                region: region.with_identifier(id.region()),
                id,
            });
        } else {
            plan.stop.push(identifier.to_string());
        }
    }

    for wanted in desired.iter() {
        let current = actual_by_id.get(wanted.region.identifier.as_str()).copied();
        if current != Some(&wanted.region) {
            plan.start.push(wanted.clone());
        }
    }

    plan
}

/// Summary of one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Provider-side identifiers started.
    pub started: Vec<String>,
    /// Provider-side identifiers stopped.
    pub stopped: Vec<String>,
    /// Provider-side identifiers handed back to their owners.
    pub reattached: Vec<String>,
    /// Declared regions rejected for malformed identifiers.
    pub rejected: usize,
}

/// Executes `plan` against `provider`, looking owners up in `snapshot`.
pub fn apply(
    provider: &dyn LocationProvider,
    snapshot: &RegistrySnapshot,
    plan: ReconcilePlan,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for identifier in plan.stop {
        tracing::debug!(region = %identifier, "stopping region monitoring");
        provider.stop_monitoring(&identifier);
        report.stopped.push(identifier);
    }

    for Reattachment { id, region } in plan.reattach {
        let Some(subscriber) = snapshot.region_owner(id.subscriber()) else {
            continue;
        };
        tracing::debug!(region = %id, "reattaching retained region to its owner");
        subscriber.add_monitored_region(region);
        report.reattached.push(id.to_string());
    }

    for wanted in plan.start {
        tracing::debug!(region = %wanted.id, "starting region monitoring");
        provider.start_monitoring(&wanted.region, &wanted.id);
        report.started.push(wanted.id.to_string());
    }

    report
}

/// Plans and applies one reconcile pass for `snapshot`.
pub fn reconcile(
    provider: &dyn LocationProvider,
    snapshot: &RegistrySnapshot,
    desired: &DesiredRegions,
    recovering: &HashSet<String>,
) -> ReconcileReport {
    let live_owners: HashSet<&str> = snapshot
        .region_subscribers()
        .iter()
        .map(|s| s.subscriber_identifier())
        .collect();

    let actual = provider.monitored_regions();
    let plan = plan(desired, &actual, &live_owners, recovering);

    let mut report = apply(provider, snapshot, plan);
    report.rejected = desired.rejected().len();
    report
}
