//! # locbroker - one location provider, many subscribers
//!
//! A location provider can run one configuration at a time: one accuracy, one
//! set of services, one list of monitored regions. `locbroker` sits between it
//! and any number of independent subscribers, folds their demands into a
//! single configuration and routes the provider's events back to whoever
//! asked for them.
//!
//! ## Core Concepts
//!
//! - **Location subscriber**: declares options (continuous, significant-change,
//!   errors, receive-all, run-in-background) and a desired accuracy
//! - **Region subscriber**: owns a set of geofences under a unique identifier
//! - **Resolver**: OR of the requested services, MIN of the continuous accuracies
//! - **Reconciler**: converges provider-side region monitoring with what
//!   subscribers declare, handing retained regions back after a restart
//! - **Router**: fans position batches, errors and region transitions out
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use locbroker::{Accuracy, InMemoryProvider, LocationBroker, SubscriberOptions};
//!
//! let provider = Arc::new(InMemoryProvider::new());
//! let broker = LocationBroker::new(provider.clone());
//!
//! broker.add_location_subscriber(my_subscriber);
//! broker.sync()?;
//! assert!(provider.is_continuous_running());
//!
//! // Hand the sink to the platform layer.
//! let sink = broker.event_sink();
//! sink.on_position_batch(positions);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Value types
pub mod error;
pub mod position;
pub mod region;

// Participants
pub mod provider;
pub mod subscriber;

// Core passes
pub mod reconcile;
pub mod registry;
pub mod resolver;
pub mod router;

// Runtime
pub mod broker;
pub mod shared;

pub use broker::{
    BrokerBuilder, BrokerConfig, BrokerHooks, BrokerStatus, EventSink, LocationBroker, NoopHooks,
    RefreshHandle,
};
pub use error::{BrokerError, BrokerResult, ExecutionError, ValidationError};
pub use position::{Accuracy, Coordinate, Position, PositionBatch};
pub use provider::{
    AuthorizationStatus, InMemoryProvider, LocationProvider, ProviderCall, ProviderError,
    ProviderErrorKind, ProviderEvent,
};
pub use reconcile::ReconcileReport;
pub use region::{NamespacedId, Region, RegionGeometry};
pub use registry::RegistrySnapshot;
pub use resolver::ServiceConfig;
pub use subscriber::{
    AppState, LocationErrorReceiver, LocationSubscriber, LocationSubscriberRef,
    ObservedLocationDemand, ObservedRegionSet, RegionErrorReceiver, RegionSubscriber,
    RegionSubscriberRef, SubscriberOptions,
};
