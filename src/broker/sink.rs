//! Handles that feed the worker from other components.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::position::Position;
use crate::provider::{ProviderError, ProviderEvent};
use crate::region::Region;

use super::state::{BrokerState, Command, RefreshKind};

/// Callback surface handed to the provider.
///
/// Every callback is marshaled onto the broker's worker; the calling thread
/// never touches the registry. Callbacks never wait: if the queue is full the
/// event is dropped and counted. Once the broker is gone they do nothing.
#[derive(Clone)]
pub struct EventSink {
    state: Weak<BrokerState>,
}

impl EventSink {
    pub(crate) fn new(state: &Arc<BrokerState>) -> Self {
        Self {
            state: Arc::downgrade(state),
        }
    }

    /// Delivers a provider event. Returns false if it was dropped.
    pub fn send(&self, event: ProviderEvent) -> bool {
        match self.state.upgrade() {
            Some(state) => state.offer(Command::Provider(event)),
            None => false,
        }
    }

    /// A batch of position updates, oldest first.
    pub fn on_position_batch(&self, positions: Vec<Position>) -> bool {
        self.send(ProviderEvent::Positions(positions.into()))
    }

    /// A general provider failure.
    pub fn on_error(&self, error: ProviderError) -> bool {
        self.send(ProviderEvent::Error(error))
    }

    /// The device entered a monitored region (provider-side identifier).
    pub fn on_region_enter(&self, region: Region) -> bool {
        self.send(ProviderEvent::RegionEntered(region))
    }

    /// The device left a monitored region (provider-side identifier).
    pub fn on_region_exit(&self, region: Region) -> bool {
        self.send(ProviderEvent::RegionExited(region))
    }

    /// Monitoring a region failed.
    pub fn on_region_monitoring_error(&self, region: Region, error: ProviderError) -> bool {
        self.send(ProviderEvent::RegionMonitoringFailed { region, error })
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("connected", &(self.state.strong_count() > 0))
            .finish()
    }
}

/// Lets subscriber state ask for a refresh after it changes.
///
/// Requests are cheap, never wait, and coalesce: many changes before the
/// worker gets to them produce one refresh pass, which still runs before the
/// next provider event is dispatched.
#[derive(Clone)]
pub struct RefreshHandle {
    state: Weak<BrokerState>,
}

impl RefreshHandle {
    pub(crate) fn new(state: &Arc<BrokerState>) -> Self {
        Self {
            state: Arc::downgrade(state),
        }
    }

    /// Location subscriber options or accuracy changed.
    pub fn refresh_location_subscribers(&self) {
        if let Some(state) = self.state.upgrade() {
            state.request_refresh(RefreshKind::Locations);
        }
    }

    /// A region subscriber's declared regions changed.
    pub fn refresh_region_subscribers(&self) {
        if let Some(state) = self.state.upgrade() {
            state.request_refresh(RefreshKind::Regions);
        }
    }
}

impl fmt::Debug for RefreshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshHandle")
            .field("connected", &(self.state.strong_count() > 0))
            .finish()
    }
}
