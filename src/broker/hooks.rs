use crate::reconcile::ReconcileReport;
use crate::registry::RegistrySnapshot;
use crate::resolver::ServiceConfig;

/// Extension points around the broker's refresh passes.
///
/// Hooks run on the worker thread, inside the serial context, so they observe
/// a consistent registry and must not block. The built-in behavior always runs;
/// hooks add to it, they cannot replace it.
pub trait BrokerHooks: Send + Sync {
    /// Before the location configuration is resolved.
    fn before_location_refresh(&self, _snapshot: &RegistrySnapshot) {}

    /// After the location configuration was resolved and applied.
    /// `changed` is false when the provider was not called.
    fn after_location_refresh(&self, _config: &ServiceConfig, _changed: bool) {}

    /// Before region monitoring is reconciled.
    fn before_region_refresh(&self, _snapshot: &RegistrySnapshot) {}

    /// After region monitoring was reconciled.
    fn after_region_refresh(&self, _report: &ReconcileReport) {}

    /// After every subscriber was removed and all services turned off.
    fn after_remove_all(&self) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl BrokerHooks for NoopHooks {}
