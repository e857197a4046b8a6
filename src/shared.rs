//! Process-wide broker instance.
//!
//! There is no ambient default: the host registers a factory once with
//! [`set_shared_factory`], and the first call to [`shared`] runs it. Factories
//! installed after that first access, or after another factory, are ignored.

use std::sync::{Mutex, OnceLock, PoisonError};

use crate::broker::LocationBroker;
use crate::error::{BrokerResult, ExecutionError};

type Factory = Box<dyn FnOnce() -> LocationBroker + Send>;

static SHARED: OnceLock<LocationBroker> = OnceLock::new();
static FACTORY: Mutex<Option<Factory>> = Mutex::new(None);

/// Installs the factory that builds the shared broker.
///
/// Returns false (and drops `factory`) if the shared broker already exists
/// or a factory was already installed.
pub fn set_shared_factory<F>(factory: F) -> bool
where
    F: FnOnce() -> LocationBroker + Send + 'static,
{
    if SHARED.get().is_some() {
        tracing::warn!("shared broker already initialized; ignoring factory");
        return false;
    }

    let mut slot = FACTORY.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        tracing::warn!("shared broker factory already installed; ignoring factory");
        return false;
    }
    *slot = Some(Box::new(factory));
    true
}

/// The shared broker, built on first access.
pub fn shared() -> BrokerResult<&'static LocationBroker> {
    if let Some(broker) = SHARED.get() {
        return Ok(broker);
    }

    // Held across initialization so concurrent first accesses build once.
    let mut slot = FACTORY.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(broker) = SHARED.get() {
        return Ok(broker);
    }
    let factory = slot.take().ok_or(ExecutionError::SharedNotConfigured)?;
    Ok(SHARED.get_or_init(factory))
}

/// True once the shared broker has been built.
#[must_use]
pub fn is_initialized() -> bool {
    SHARED.get().is_some()
}

/// Authorization state of the shared broker's provider.
///
/// Never builds the shared broker: false until [`shared`] has run the
/// factory.
#[must_use]
pub fn is_authorized() -> bool {
    SHARED.get().is_some_and(LocationBroker::is_authorized)
}
