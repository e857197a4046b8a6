//! State shared between the broker handle, its sinks and the worker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use crossbeam_channel::{Sender, TrySendError};

use crate::position::{Accuracy, Position};
use crate::provider::ProviderEvent;
use crate::registry::SnapshotCell;
use crate::resolver::ServiceConfig;
use crate::subscriber::{AppState, LocationSubscriberRef, RegionSubscriberRef};

/// Work item for the serial worker.
pub(crate) enum Command {
    AddLocation(LocationSubscriberRef),
    RemoveLocation(LocationSubscriberRef),
    AddRegion(RegionSubscriberRef),
    RemoveRegion(RegionSubscriberRef),
    RefreshLocations,
    RefreshRegions,
    RemoveAll,
    SetAppState(AppState),
    Provider(ProviderEvent),
    /// Nudges the worker to look at the pending-refresh flags.
    Wake,
    Barrier { reply: Sender<()> },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshKind {
    Locations,
    Regions,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub dropped_events: AtomicU64,
    pub dropped_region_events: AtomicU64,
    pub rejected_regions: AtomicU64,
    pub rejected_subscribers: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Values the worker publishes for readers on other threads.
#[derive(Debug, Default)]
pub(crate) struct Published {
    pub snapshot: SnapshotCell,
    pub current_location: RwLock<Option<Position>>,
    pub current_accuracy: RwLock<Option<Accuracy>>,
    pub service: RwLock<ServiceConfig>,
    pub app_state: RwLock<AppState>,
}

pub(crate) fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

pub(crate) fn write<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(PoisonError::into_inner) = value;
}

pub(crate) struct BrokerState {
    tx: Sender<Command>,
    deferred: Mutex<VecDeque<Command>>,
    worker_thread: OnceLock<ThreadId>,
    pending_locations: AtomicBool,
    pending_regions: AtomicBool,
    pub counters: Counters,
    pub published: Published,
}

impl BrokerState {
    pub(crate) fn new(tx: Sender<Command>) -> Self {
        Self {
            tx,
            deferred: Mutex::new(VecDeque::new()),
            worker_thread: OnceLock::new(),
            pending_locations: AtomicBool::new(false),
            pending_regions: AtomicBool::new(false),
            counters: Counters::default(),
            published: Published::default(),
        }
    }

    pub(crate) fn mark_worker_thread(&self) {
        let _ = self.worker_thread.set(thread::current().id());
    }

    pub(crate) fn on_worker_thread(&self) -> bool {
        self.worker_thread.get() == Some(&thread::current().id())
    }

    /// Enqueues a command that must not be lost.
    ///
    /// Calls made from the worker itself (subscriber callbacks, hooks) are
    /// deferred until the current item finishes; waiting on the queue from
    /// there could never succeed.
    pub(crate) fn submit(&self, command: Command) -> bool {
        if self.on_worker_thread() {
            self.defer(command);
            return true;
        }
        self.tx.send(command).is_ok()
    }

    /// Enqueues a provider event without waiting. Returns false if dropped.
    pub(crate) fn offer(&self, command: Command) -> bool {
        if self.on_worker_thread() {
            self.defer(command);
            return true;
        }
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                Counters::bump(&self.counters.dropped_events);
                false
            }
        }
    }

    /// Flags a refresh and wakes the worker.
    ///
    /// Repeated requests before the worker gets to them coalesce into one pass.
    /// If the queue is full the wake is skipped: the worker checks the flags
    /// before every item it processes anyway.
    pub(crate) fn request_refresh(&self, kind: RefreshKind) {
        let flag = match kind {
            RefreshKind::Locations => &self.pending_locations,
            RefreshKind::Regions => &self.pending_regions,
        };
        let already_pending = flag.swap(true, Ordering::AcqRel);
        if already_pending || self.on_worker_thread() {
            return;
        }
        let _ = self.tx.try_send(Command::Wake);
    }

    pub(crate) fn take_pending(&self, kind: RefreshKind) -> bool {
        match kind {
            RefreshKind::Locations => self.pending_locations.swap(false, Ordering::AcqRel),
            RefreshKind::Regions => self.pending_regions.swap(false, Ordering::AcqRel),
        }
    }

    pub(crate) fn clear_pending(&self) {
        self.pending_locations.store(false, Ordering::Release);
        self.pending_regions.store(false, Ordering::Release);
    }

    fn defer(&self, command: Command) {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(command);
    }

    pub(crate) fn pop_deferred(&self) -> Option<Command> {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;

    use super::*;

    #[test]
    fn refresh_requests_coalesce() {
        let (tx, rx) = bounded(8);
        let state = BrokerState::new(tx);

        state.request_refresh(RefreshKind::Locations);
        state.request_refresh(RefreshKind::Locations);
        assert_eq!(rx.len(), 1);

        assert!(state.take_pending(RefreshKind::Locations));
        assert!(!state.take_pending(RefreshKind::Locations));
        assert!(!state.take_pending(RefreshKind::Regions));
    }

    #[test]
    fn offer_counts_drops_when_full() {
        let (tx, _rx) = bounded(1);
        let state = BrokerState::new(tx);

        assert!(state.offer(Command::Wake));
        assert!(!state.offer(Command::Wake));
        assert_eq!(Counters::get(&state.counters.dropped_events), 1);
    }

    #[test]
    fn worker_thread_calls_are_deferred() {
        let (tx, rx) = bounded(1);
        let state = BrokerState::new(tx);
        state.mark_worker_thread();

        assert!(state.submit(Command::RefreshLocations));
        assert!(rx.is_empty());
        assert!(matches!(state.pop_deferred(), Some(Command::RefreshLocations)));
        assert!(state.pop_deferred().is_none());
    }
}
