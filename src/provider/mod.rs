//! Location provider capability interface.
//!
//! The broker drives exactly one provider. Provider calls are fire-and-forget:
//! nothing here waits for a fix. Callbacks travel back into the broker through
//! an [`EventSink`](crate::broker::EventSink) as [`ProviderEvent`]s.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::{Accuracy, Position, PositionBatch};
use crate::region::{NamespacedId, Region};

/// In-memory reference provider.
pub mod memory;

pub use memory::{InMemoryProvider, ProviderCall};

/// Authorization state for location services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
    /// Restricted by policy; the user cannot change it.
    Restricted,
    /// Explicitly denied.
    Denied,
    /// Authorized in foreground and background.
    AuthorizedAlways,
    /// Authorized while the application is in use.
    AuthorizedWhenInUse,
}

impl AuthorizationStatus {
    /// True for either authorized state.
    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::AuthorizedAlways | Self::AuthorizedWhenInUse)
    }
}

/// Category of a provider-reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// No fix is available right now.
    LocationUnknown,
    /// Access to location services was denied.
    Denied,
    /// Network-assisted positioning failed.
    Network,
    /// Region monitoring was denied.
    RegionMonitoringDenied,
    /// A region could not be monitored.
    RegionMonitoringFailure,
    /// Region monitoring setup is delayed.
    RegionMonitoringSetupDelayed,
    /// Anything else.
    Other,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocationUnknown => "location unknown",
            Self::Denied => "denied",
            Self::Network => "network",
            Self::RegionMonitoringDenied => "region monitoring denied",
            Self::RegionMonitoringFailure => "region monitoring failure",
            Self::RegionMonitoringSetupDelayed => "region monitoring setup delayed",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// An error reported by the provider. Routed to subscribers as data.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    /// Failure category.
    pub kind: ProviderErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl ProviderError {
    /// Creates a provider error.
    #[must_use]
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A callback from the provider, marshaled onto the broker's worker.
///
/// Region events carry the provider-side region, whose identifier is the
/// namespaced form.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    Positions(PositionBatch),
    Error(ProviderError),
    RegionEntered(Region),
    RegionExited(Region),
    RegionMonitoringFailed { region: Region, error: ProviderError },
}

/// What the broker needs from a location service.
///
/// Implementations must be cheap to call and must not block waiting for a
/// position; the broker calls them from its worker thread.
pub trait LocationProvider: Send + Sync {
    /// Current authorization state.
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Most recent fix the provider knows about, if any.
    fn last_known_position(&self) -> Option<Position>;

    /// Accuracy to use for continuous updates.
    fn set_desired_accuracy(&self, accuracy: Accuracy);

    /// Start continuous updates.
    fn start_continuous_updates(&self);

    /// Stop continuous updates.
    fn stop_continuous_updates(&self);

    /// Start significant-change monitoring.
    fn start_significant_change_monitoring(&self);

    /// Stop significant-change monitoring.
    fn stop_significant_change_monitoring(&self);

    /// Start monitoring `region`, whose identifier equals `id.to_string()`.
    fn start_monitoring(&self, region: &Region, id: &NamespacedId);

    /// Stop monitoring the region with this provider-side identifier.
    ///
    /// Takes the raw identifier because orphaned regions may not parse.
    fn stop_monitoring(&self, identifier: &str);

    /// Regions currently monitored, with provider-side identifiers.
    fn monitored_regions(&self) -> Vec<Region>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_states() {
        assert!(AuthorizationStatus::AuthorizedAlways.is_authorized());
        assert!(AuthorizationStatus::AuthorizedWhenInUse.is_authorized());
        assert!(!AuthorizationStatus::Denied.is_authorized());
        assert!(!AuthorizationStatus::NotDetermined.is_authorized());
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError::new(ProviderErrorKind::Network, "offline");
        assert_eq!(err.to_string(), "network: offline");
    }
}
