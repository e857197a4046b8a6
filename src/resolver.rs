//! Configuration resolver.
//!
//! Folds a registry snapshot into what the provider should be doing:
//! - which location services to run and at what accuracy
//!   ([`resolve_location_config`]), then applies the difference against what
//!   was last applied ([`apply_service_config`]);
//! - which namespaced regions should be monitored ([`resolve_desired_regions`]).
//!
//! The provider runs a single accuracy for everyone, so the broker asks for the
//! tightest accuracy among continuous subscribers. Subscribers that wanted
//! something coarser still get the more precise fixes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::position::Accuracy;
use crate::provider::LocationProvider;
use crate::region::{NamespacedId, Region};
use crate::subscriber::{AppState, LocationSubscriberRef, RegionSubscriberRef, SubscriberOptions};

/// Provider services required by the active location subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Run continuous updates.
    pub continuous: bool,
    /// Run significant-change monitoring.
    pub significant_change: bool,
    /// Tightest accuracy among continuous subscribers; `None` when nobody
    /// requests continuous updates.
    pub accuracy: Option<Accuracy>,
}

impl ServiceConfig {
    /// Everything off.
    pub const OFF: Self = Self {
        continuous: false,
        significant_change: false,
        accuracy: None,
    };
}

/// Computes the service configuration for `subscribers` in `state`.
///
/// Subscribers with an empty option mask, or inactive in `state`, contribute
/// nothing.
pub fn resolve_location_config<'a, I>(subscribers: I, state: AppState) -> ServiceConfig
where
    I: IntoIterator<Item = &'a LocationSubscriberRef>,
{
    let mut config = ServiceConfig::OFF;

    for subscriber in subscribers {
        let options = subscriber.location_subscriber_options();
        if options.is_empty() || !options.is_active_in(state) {
            continue;
        }

        if options.contains(SubscriberOptions::CONTINUOUS) {
            config.continuous = true;
            let wanted = subscriber.desired_accuracy();
            config.accuracy = Some(config.accuracy.map_or(wanted, |current| current.tightest(wanted)));
        }
        if options.contains(SubscriberOptions::SIGNIFICANT_CHANGE) {
            config.significant_change = true;
        }
    }

    config
}

/// What the provider was last told to do.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AppliedConfig {
    /// Last applied service configuration.
    pub service: ServiceConfig,
    /// Last accuracy actually sent to the provider. Survives continuous
    /// updates being switched off.
    pub requested_accuracy: Option<Accuracy>,
}

/// Provider calls issued by one [`apply_service_config`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    /// Accuracy was sent.
    pub accuracy_set: bool,
    /// Continuous updates were started or stopped.
    pub continuous_toggled: bool,
    /// Significant-change monitoring was started or stopped.
    pub significant_change_toggled: bool,
}

impl ApplyOutcome {
    /// True if any provider call was made.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.accuracy_set || self.continuous_toggled || self.significant_change_toggled
    }
}

/// Applies `target` to `provider`, issuing only the calls that differ from
/// `applied`, and records the result in `applied`.
///
/// Accuracy is set before continuous updates start so the first fixes already
/// use it.
pub fn apply_service_config(
    provider: &dyn LocationProvider,
    applied: &mut AppliedConfig,
    target: ServiceConfig,
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();

    if let Some(accuracy) = target.accuracy {
        if applied.requested_accuracy != Some(accuracy) {
            provider.set_desired_accuracy(accuracy);
            applied.requested_accuracy = Some(accuracy);
            outcome.accuracy_set = true;
            tracing::debug!(accuracy = %accuracy, "requested provider accuracy");
        }
    }

    if target.continuous != applied.service.continuous {
        if target.continuous {
            provider.start_continuous_updates();
        } else {
            provider.stop_continuous_updates();
        }
        outcome.continuous_toggled = true;
        tracing::debug!(running = target.continuous, "toggled continuous updates");
    }

    if target.significant_change != applied.service.significant_change {
        if target.significant_change {
            provider.start_significant_change_monitoring();
        } else {
            provider.stop_significant_change_monitoring();
        }
        outcome.significant_change_toggled = true;
        tracing::debug!(running = target.significant_change, "toggled significant-change monitoring");
    }

    applied.service = target;
    outcome
}

/// A region that should be under provider monitoring.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredRegion {
    /// Parsed provider-side identifier.
    pub id: NamespacedId,
    /// Provider-facing region (identifier is `id.to_string()`).
    pub region: Region,
}

/// A declared region that could not be namespaced.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRegion {
    /// Identifier of the declaring subscriber.
    pub subscriber_identifier: String,
    /// The offending local identifier.
    pub region_identifier: String,
    /// Why it was rejected.
    pub error: ValidationError,
}

/// Union of every region subscriber's declared regions.
#[derive(Debug, Clone, Default)]
pub struct DesiredRegions {
    by_id: BTreeMap<String, DesiredRegion>,
    rejected: Vec<RejectedRegion>,
}

impl DesiredRegions {
    /// True if `identifier` (provider-side form) is desired.
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.by_id.contains_key(identifier)
    }

    /// Desired regions ordered by provider-side identifier.
    pub fn iter(&self) -> impl Iterator<Item = &DesiredRegion> {
        self.by_id.values()
    }

    /// Number of desired regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when nothing is desired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Regions dropped because their identifiers were malformed.
    #[must_use]
    pub fn rejected(&self) -> &[RejectedRegion] {
        &self.rejected
    }
}

/// Collects the namespaced regions declared by `subscribers`.
///
/// Malformed identifiers are rejected here, before anything reaches the
/// provider. Rejection is non-fatal on purpose: the region is logged at
/// `error` level, reported in [`DesiredRegions::rejected`] and skipped, and
/// the subscriber's other regions are still monitored.
pub fn resolve_desired_regions(subscribers: &[RegionSubscriberRef]) -> DesiredRegions {
    let mut desired = DesiredRegions::default();

    for subscriber in subscribers {
        let owner = subscriber.subscriber_identifier();
        for region in subscriber.monitored_regions() {
            match region.namespaced(owner) {
                Ok((id, provider_region)) => {
                    desired.by_id.entry(id.to_string()).or_insert(DesiredRegion {
                        id,
                        region: provider_region,
                    });
                }
                Err(error) => {
                    tracing::error!(
                        subscriber = owner,
                        region = %region.identifier,
                        error = %error,
                        "rejected region with malformed identifier"
                    );
                    desired.rejected.push(RejectedRegion {
                        subscriber_identifier: owner.to_string(),
                        region_identifier: region.identifier.clone(),
                        error,
                    });
                }
            }
        }
    }

    desired
}
