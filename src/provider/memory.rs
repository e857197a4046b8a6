//! In-memory provider.
//!
//! Keeps provider state in a mutex and records every call the broker makes.
//! It stands in for the platform service in embedded use and tests, and is the
//! reference for what a provider is expected to do with each call.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::position::{Accuracy, Position};
use crate::region::{NamespacedId, Region};

use super::{AuthorizationStatus, LocationProvider};

/// A call received by [`InMemoryProvider`].
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    SetDesiredAccuracy(Accuracy),
    StartContinuous,
    StopContinuous,
    StartSignificantChange,
    StopSignificantChange,
    StartMonitoring(String),
    StopMonitoring(String),
}

#[derive(Debug, Default)]
struct ProviderState {
    calls: Vec<ProviderCall>,
    monitored: BTreeMap<String, Region>,
    continuous: bool,
    significant_change: bool,
    accuracy: Option<Accuracy>,
    last_position: Option<Position>,
    authorization: AuthorizationStatus,
}

/// Provider that lives entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    state: Mutex<ProviderState>,
}

impl InMemoryProvider {
    /// Creates an authorized provider with no retained state.
    #[must_use]
    pub fn new() -> Self {
        let provider = Self::default();
        provider.set_authorization_status(AuthorizationStatus::AuthorizedAlways);
        provider
    }

    fn state(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pretends the platform kept monitoring `region` from an earlier run.
    ///
    /// `region.identifier` is stored as-is; no call is recorded.
    pub fn retain_region(&self, region: Region) {
        self.state().monitored.insert(region.identifier.clone(), region);
    }

    /// Sets the reported authorization status.
    pub fn set_authorization_status(&self, status: AuthorizationStatus) {
        self.state().authorization = status;
    }

    /// Sets the position returned by `last_known_position`.
    pub fn set_last_known_position(&self, position: Option<Position>) {
        self.state().last_position = position;
    }

    /// Every call recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    /// Drains the recorded calls.
    pub fn take_calls(&self) -> Vec<ProviderCall> {
        std::mem::take(&mut self.state().calls)
    }

    /// Identifiers currently monitored, sorted.
    #[must_use]
    pub fn monitored_identifiers(&self) -> Vec<String> {
        self.state().monitored.keys().cloned().collect()
    }

    /// Whether continuous updates are running.
    #[must_use]
    pub fn is_continuous_running(&self) -> bool {
        self.state().continuous
    }

    /// Whether significant-change monitoring is running.
    #[must_use]
    pub fn is_significant_change_running(&self) -> bool {
        self.state().significant_change
    }

    /// Last accuracy set by the broker.
    #[must_use]
    pub fn desired_accuracy(&self) -> Option<Accuracy> {
        self.state().accuracy
    }
}

impl LocationProvider for InMemoryProvider {
    fn authorization_status(&self) -> AuthorizationStatus {
        self.state().authorization
    }

    fn last_known_position(&self) -> Option<Position> {
        self.state().last_position.clone()
    }

    fn set_desired_accuracy(&self, accuracy: Accuracy) {
        let mut state = self.state();
        state.accuracy = Some(accuracy);
        state.calls.push(ProviderCall::SetDesiredAccuracy(accuracy));
    }

    fn start_continuous_updates(&self) {
        let mut state = self.state();
        state.continuous = true;
        state.calls.push(ProviderCall::StartContinuous);
    }

    fn stop_continuous_updates(&self) {
        let mut state = self.state();
        state.continuous = false;
        state.calls.push(ProviderCall::StopContinuous);
    }

    fn start_significant_change_monitoring(&self) {
        let mut state = self.state();
        state.significant_change = true;
        state.calls.push(ProviderCall::StartSignificantChange);
    }

    fn stop_significant_change_monitoring(&self) {
        let mut state = self.state();
        state.significant_change = false;
        state.calls.push(ProviderCall::StopSignificantChange);
    }

    fn start_monitoring(&self, region: &Region, id: &NamespacedId) {
        let key = id.to_string();
        let mut state = self.state();
        state.monitored.insert(key.clone(), region.clone());
        state.calls.push(ProviderCall::StartMonitoring(key));
    }

    fn stop_monitoring(&self, identifier: &str) {
        let mut state = self.state();
        state.monitored.remove(identifier);
        state.calls.push(ProviderCall::StopMonitoring(identifier.to_string()));
    }

    fn monitored_regions(&self) -> Vec<Region> {
        self.state().monitored.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::position::Coordinate;

    use super::*;

    #[test]
    fn records_calls_and_state() {
        let provider = InMemoryProvider::new();
        provider.set_desired_accuracy(Accuracy::BEST);
        provider.start_continuous_updates();

        assert!(provider.is_continuous_running());
        assert_eq!(provider.desired_accuracy(), Some(Accuracy::BEST));
        assert_eq!(
            provider.take_calls(),
            vec![
                ProviderCall::SetDesiredAccuracy(Accuracy::BEST),
                ProviderCall::StartContinuous
            ]
        );
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn monitoring_table() {
        let provider = InMemoryProvider::new();
        let (id, region) = Region::circle("home", Coordinate::new(1.0, 2.0), 100.0)
            .namespaced("owner")
            .unwrap();

        provider.start_monitoring(&region, &id);
        assert_eq!(provider.monitored_identifiers(), vec!["owner+home".to_string()]);
        assert_eq!(provider.monitored_regions()[0].identifier, "owner+home");

        provider.stop_monitoring("owner+home");
        assert!(provider.monitored_regions().is_empty());
    }

    #[test]
    fn retained_regions_are_not_recorded_as_calls() {
        let provider = InMemoryProvider::new();
        provider.retain_region(Region::circle("old+spot", Coordinate::new(0.0, 0.0), 50.0));
        assert_eq!(provider.monitored_identifiers(), vec!["old+spot".to_string()]);
        assert!(provider.calls().is_empty());
    }
}
