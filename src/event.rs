//! Per-operation events emitted by the harness, and the sinks that receive them.

use core::fmt;

use parking_lot::Mutex;
use tracing::info;

/// Which side of the queue a worker is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Puts values in.
    Producer,
    /// Takes values out.
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("Producer"),
            Role::Consumer => f.write_str("Consumer"),
        }
    }
}

/// One successful put or take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<T> {
    /// Side of the queue the event came from.
    pub role: Role,
    /// 1-based worker id within its role.
    pub worker: usize,
    /// The value put or taken.
    pub value: T,
    /// Ring slot the value was written to or read from.
    pub slot: usize,
}

/// Receives events while the queue lock is still held, so events from one
/// queue arrive in ring order. Every queue caller waits on `record`.
pub trait EventSink<T>: Send + Sync {
    /// Handle one event.
    fn record(&self, event: &Event<T>);
}

/// Logs every event at `info` level, one line each.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl<T: fmt::Display> EventSink<T> for TracingSink {
    fn record(&self, event: &Event<T>) {
        match event.role {
            Role::Producer => info!(
                role = %event.role,
                worker = event.worker,
                slot = event.slot,
                "Producer {} produced: {} -> buffer[{}]",
                event.worker,
                event.value,
                event.slot
            ),
            Role::Consumer => info!(
                role = %event.role,
                worker = event.worker,
                slot = event.slot,
                "Consumer {} consumed: {} <- buffer[{}]",
                event.worker,
                event.value,
                event.slot
            ),
        }
    }
}

/// Keeps every event in memory, in the order they were recorded.
#[derive(Debug)]
pub struct RecordingSink<T> {
    events: Mutex<Vec<Event<T>>>,
}

impl<T> RecordingSink<T> {
    /// An empty sink.
    pub fn new() -> Self {
        RecordingSink { events: Mutex::new(Vec::new()) }
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Remove and return every recorded event.
    pub fn take_events(&self) -> Vec<Event<T>> {
        core::mem::take(&mut *self.events.lock())
    }

    /// Values recorded for `role`, in recording order.
    pub fn values(&self, role: Role) -> Vec<T>
    where
        T: Clone,
    {
        self.events
            .lock()
            .iter()
            .filter(|e| e.role == role)
            .map(|e| e.value.clone())
            .collect()
    }
}

impl<T> Default for RecordingSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> EventSink<T> for RecordingSink<T> {
    fn record(&self, event: &Event<T>) {
        self.events.lock().push(event.clone());
    }
}
