//! Error types for queue operations and harness settings.

use thiserror::Error;

/// Returned by [`BoundedQueue::try_new`](crate::BoundedQueue::try_new) for a zero capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("capacity must be greater than 0")]
pub struct CapacityError;

/// A blocking put was cancelled. The rejected item is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is cancelled")]
pub struct PutError<T>(pub T);

impl<T> PutError<T> {
    /// Recover the item that was not inserted.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// A blocking take was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is cancelled")]
pub struct TakeError;

/// A non-blocking put could not insert. The item is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryPutError<T> {
    /// Every slot was occupied.
    #[error("queue is full")]
    Full(T),
    /// The queue was cancelled.
    #[error("queue is cancelled")]
    Cancelled(T),
}

impl<T> TryPutError<T> {
    /// Recover the item that was not inserted.
    pub fn into_inner(self) -> T {
        match self {
            TryPutError::Full(item) | TryPutError::Cancelled(item) => item,
        }
    }

    /// Whether the put failed for lack of space.
    pub fn is_full(&self) -> bool {
        matches!(self, TryPutError::Full(_))
    }

    /// Whether the put failed because the queue was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TryPutError::Cancelled(_))
    }
}

/// A non-blocking take found nothing to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryTakeError {
    /// No item was resident.
    #[error("queue is empty")]
    Empty,
    /// The queue was cancelled.
    #[error("queue is cancelled")]
    Cancelled,
}

/// A timed put gave up. The item is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PutTimeoutError<T> {
    /// The queue was still full at the deadline.
    #[error("timed out waiting for space")]
    Timeout(T),
    /// The queue was cancelled.
    #[error("queue is cancelled")]
    Cancelled(T),
}

impl<T> PutTimeoutError<T> {
    /// Recover the item that was not inserted.
    pub fn into_inner(self) -> T {
        match self {
            PutTimeoutError::Timeout(item) | PutTimeoutError::Cancelled(item) => item,
        }
    }

    /// Whether the deadline passed before space opened up.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PutTimeoutError::Timeout(_))
    }
}

/// A timed take gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TakeTimeoutError {
    /// The queue was still empty at the deadline.
    #[error("timed out waiting for an item")]
    Timeout,
    /// The queue was cancelled.
    #[error("queue is cancelled")]
    Cancelled,
}

/// Rejected worker harness settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Zero queue capacity.
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    /// No producer workers.
    #[error("at least one producer is required")]
    NoProducers,
    /// No consumer workers.
    #[error("at least one consumer is required")]
    NoConsumers,
    /// The shortest pause is longer than the longest.
    #[error("think time range is inverted: min {min_ms}ms > max {max_ms}ms")]
    InvertedThinkTime {
        /// Shortest pause, in milliseconds.
        min_ms: u128,
        /// Longest pause, in milliseconds.
        max_ms: u128,
    },
    /// A value source was given a range with no values in it.
    #[error("amount range {start}..={end} is empty")]
    EmptyAmounts {
        /// First value of the rejected range.
        start: u32,
        /// Last value of the rejected range.
        end: u32,
    },
}
