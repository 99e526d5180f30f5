//! Live change fan-out: subscriber registry, broadcaster, listeners.
//!
//! Every listener owns one bounded queue. Publishing copies the current set
//! of queue senders out of the registry lock and then `try_send`s to each.
//! Delivery is lossy: a full queue drops the event for that listener only,
//! and clients reconcile by re-fetching a snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};

use dayboard_core::{BoardDate, ChangeEvent, StatusChange};

pub type ListenerId = u64;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A freshly registered queue: the receiving end of one listener.
#[derive(Debug)]
pub struct ListenerHandle {
    id: ListenerId,
    receiver: mpsc::Receiver<ChangeEvent>,
}

impl ListenerHandle {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }
}

/// The set of currently connected listeners.
///
/// The mutex is held only long enough to insert, remove, or copy out the
/// senders; never across a delivery.
#[derive(Debug)]
pub struct SubscriberRegistry {
    capacity: usize,
    next_id: AtomicU64,
    listeners: Mutex<HashMap<ListenerId, mpsc::Sender<ChangeEvent>>>,
}

impl SubscriberRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Create a bounded queue and add it to the set. Never fails.
    pub fn register(&self) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.lock().insert(id, sender);
        ListenerHandle { id, receiver }
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn deregister(&self, id: ListenerId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn snapshot(&self) -> Vec<(ListenerId, mpsc::Sender<ChangeEvent>)> {
        self.lock()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ListenerId, mpsc::Sender<ChangeEvent>>> {
        // The map stays consistent even if a holder panicked mid-operation.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Sequence numbers
// ---------------------------------------------------------------------------

/// Millisecond wall clock that never goes backwards within the process.
#[derive(Debug, Default)]
pub struct SequenceClock {
    last: AtomicU64,
}

impl SequenceClock {
    pub fn next(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let previous = self.last.fetch_max(now, Ordering::SeqCst);
        previous.max(now)
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Per-call delivery tally returned by [`Broadcaster::publish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Listeners whose queue was full; the event is lost for them.
    pub dropped: usize,
    /// Listeners whose queue was closed; they were deregistered.
    pub evicted: usize,
}

#[derive(Debug)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    clock: SequenceClock,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(SubscriberRegistry::new(capacity)),
            clock: SequenceClock::default(),
        }
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Register a listener whose queue is deregistered when it is dropped.
    pub fn open_listener(&self) -> Listener {
        let handle = self.registry.register();
        tracing::debug!(listener = handle.id, "listener registered");
        Listener {
            id: handle.id,
            receiver: handle.receiver,
            registry: Arc::clone(&self.registry),
            state: ListenerState::Active,
        }
    }

    /// Deliver `event` to every listener registered right now.
    ///
    /// Never blocks, never fails.
    pub fn publish(&self, event: &ChangeEvent) -> PublishReport {
        let mut report = PublishReport::default();
        for (id, sender) in self.registry.snapshot() {
            match sender.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    tracing::debug!(listener = id, seq = event.sequence, "listener queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    report.evicted += 1;
                    self.registry.deregister(id);
                    tracing::debug!(listener = id, "listener queue closed, deregistered");
                }
            }
        }
        report
    }

    /// Stamp a sequence number on the changes for `date` and publish them.
    ///
    /// Call only after the corresponding write has been persisted.
    pub fn notify_change(&self, date: BoardDate, changes: Vec<StatusChange>) -> ChangeEvent {
        let event = ChangeEvent {
            date,
            changes,
            sequence: self.clock.next(),
        };
        let report = self.publish(&event);
        tracing::debug!(
            date = %event.date,
            seq = event.sequence,
            delivered = report.delivered,
            dropped = report.dropped,
            evicted = report.evicted,
            "change published",
        );
        event
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Active,
    Closed,
}

/// A registered consumer of change events.
///
/// `Active` until [`Listener::close`] is called, its queue is closed, or it is
/// dropped; the transition to `Closed` deregisters it exactly once.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    receiver: mpsc::Receiver<ChangeEvent>,
    registry: Arc<SubscriberRegistry>,
    state: ListenerState,
}

impl Listener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Wait for the next event. `None` once the listener is closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        if self.state == ListenerState::Closed {
            return None;
        }
        let event = self.receiver.recv().await;
        if event.is_none() {
            self.close();
        }
        event
    }

    pub fn close(&mut self) {
        if self.state == ListenerState::Closed {
            return;
        }
        self.state = ListenerState::Closed;
        self.receiver.close();
        self.registry.deregister(self.id);
        tracing::debug!(listener = self.id, "listener deregistered");
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
