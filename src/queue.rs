//! Blocking bounded ring shared by any number of producers and consumers.

use core::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{
    CapacityError, PutError, PutTimeoutError, TakeError, TakeTimeoutError, TryPutError,
    TryTakeError,
};
use crate::sync::{Condvar, Mutex, MutexGuard};

/// Ring storage and cursors. Only ever touched with the queue lock held.
struct State<T> {
    slots: Box<[Option<T>]>,
    /// Next slot to fill.
    head: usize,
    /// Next slot to read.
    tail: usize,
    count: usize,
    cancelled: bool,
}

impl<T> State<T> {
    fn with_capacity(capacity: usize) -> Self {
        State {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            count: 0,
            cancelled: false,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn push(&mut self, item: T) -> usize {
        debug_assert!(!self.is_full(), "push into a full ring");
        let slot = self.head;
        debug_assert!(self.slots[slot].is_none(), "slot {slot} overwritten before it was read");
        self.slots[slot] = Some(item);
        self.head = (self.head + 1) % self.capacity();
        self.count += 1;
        self.check_invariants();
        slot
    }

    fn pop(&mut self) -> (usize, T) {
        debug_assert!(!self.is_empty(), "pop from an empty ring");
        let slot = self.tail;
        let Some(item) = self.slots[slot].take() else {
            unreachable!("slot {slot} empty with {} resident items", self.count);
        };
        self.tail = (self.tail + 1) % self.capacity();
        self.count -= 1;
        self.check_invariants();
        (slot, item)
    }

    #[inline]
    fn check_invariants(&self) {
        debug_assert!(self.count <= self.capacity());
        debug_assert_eq!((self.tail + self.count) % self.capacity(), self.head);
        debug_assert_eq!(self.slots.iter().filter(|s| s.is_some()).count(), self.count);
    }
}

enum Wait {
    Ready,
    Cancelled,
    TimedOut,
}

/// Fixed-capacity FIFO queue with blocking `put`/`take`.
///
/// One mutex guards the ring; producers park on `space_available` while the
/// ring is full and consumers park on `item_available` while it is empty.
/// Items come out in exactly the order they went in, across all producers.
///
/// [`cancel`](Self::cancel) wakes every parked caller and makes all further
/// operations fail, so worker loops built on the queue can always be stopped.
///
/// ```
/// use ringlock::BoundedQueue;
///
/// let queue = BoundedQueue::new(2);
/// queue.put(1).unwrap();
/// queue.put(2).unwrap();
/// assert!(queue.try_put(3).unwrap_err().is_full());
/// assert_eq!(queue.take(), Ok(1));
/// ```
pub struct BoundedQueue<T> {
    state: Mutex<State<T>>,
    space_available: Condvar,
    item_available: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Use [`try_new`](Self::try_new) to get an error instead.
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(queue) => queue,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create a queue holding at most `capacity` items, or fail on a zero capacity.
    pub fn try_new(capacity: usize) -> Result<Self, CapacityError> {
        if capacity == 0 {
            return Err(CapacityError);
        }
        Ok(BoundedQueue {
            state: Mutex::new(State::with_capacity(capacity)),
            space_available: Condvar::new(),
            item_available: Condvar::new(),
            capacity,
        })
    }

    /// Insert `item`, blocking while the queue is full.
    ///
    /// Fails only if the queue is cancelled before the item could be placed,
    /// in which case the item is handed back untouched.
    pub fn put(&self, item: T) -> Result<(), PutError<T>> {
        self.put_indexed(item).map(|_| ())
    }

    /// Like [`put`](Self::put), returning the slot the item was written to.
    pub fn put_indexed(&self, item: T) -> Result<usize, PutError<T>> {
        self.put_with(item, |_, _| {})
    }

    /// Like [`put_indexed`](Self::put_indexed), calling `observe` with the
    /// slot and the stored item before the lock is released.
    ///
    /// Observers on one queue run in ring order, so a trace built from them
    /// never shows a take ahead of the put that fed it. Keep `observe` short:
    /// every other caller waits on it.
    pub fn put_with<F>(&self, item: T, observe: F) -> Result<usize, PutError<T>>
    where
        F: FnOnce(usize, &T),
    {
        let mut state = self.state.lock();
        match self.wait_for_space(&mut state, None) {
            Wait::Ready => {
                let slot = state.push(item);
                if let Some(stored) = state.slots[slot].as_ref() {
                    observe(slot, stored);
                }
                drop(state);
                self.item_available.notify_one();
                Ok(slot)
            }
            Wait::Cancelled | Wait::TimedOut => Err(PutError(item)),
        }
    }

    /// Remove the oldest item, blocking while the queue is empty.
    pub fn take(&self) -> Result<T, TakeError> {
        self.take_indexed().map(|(_, item)| item)
    }

    /// Like [`take`](Self::take), also returning the slot the item was read from.
    pub fn take_indexed(&self) -> Result<(usize, T), TakeError> {
        self.take_with(|_, _| {})
    }

    /// Like [`take_indexed`](Self::take_indexed), calling `observe` with the
    /// slot and the item before the lock is released.
    pub fn take_with<F>(&self, observe: F) -> Result<(usize, T), TakeError>
    where
        F: FnOnce(usize, &T),
    {
        let mut state = self.state.lock();
        match self.wait_for_item(&mut state, None) {
            Wait::Ready => {
                let (slot, item) = state.pop();
                observe(slot, &item);
                drop(state);
                self.space_available.notify_one();
                Ok((slot, item))
            }
            Wait::Cancelled | Wait::TimedOut => Err(TakeError),
        }
    }

    /// Insert `item` only if there is room right now.
    pub fn try_put(&self, item: T) -> Result<(), TryPutError<T>> {
        let state = self.state.lock();
        if state.cancelled {
            return Err(TryPutError::Cancelled(item));
        }
        if state.is_full() {
            return Err(TryPutError::Full(item));
        }
        self.insert(state, item);
        Ok(())
    }

    /// Remove the oldest item only if one is resident right now.
    pub fn try_take(&self) -> Result<T, TryTakeError> {
        let state = self.state.lock();
        if state.cancelled {
            return Err(TryTakeError::Cancelled);
        }
        if state.is_empty() {
            return Err(TryTakeError::Empty);
        }
        Ok(self.remove(state).1)
    }

    /// Insert `item`, waiting at most `timeout` for space.
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), PutTimeoutError<T>> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        match self.wait_for_space(&mut state, deadline) {
            Wait::Ready => {
                self.insert(state, item);
                Ok(())
            }
            Wait::Cancelled => Err(PutTimeoutError::Cancelled(item)),
            Wait::TimedOut => Err(PutTimeoutError::Timeout(item)),
        }
    }

    /// Remove the oldest item, waiting at most `timeout` for one to arrive.
    pub fn take_timeout(&self, timeout: Duration) -> Result<T, TakeTimeoutError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        match self.wait_for_item(&mut state, deadline) {
            Wait::Ready => Ok(self.remove(state).1),
            Wait::Cancelled => Err(TakeTimeoutError::Cancelled),
            Wait::TimedOut => Err(TakeTimeoutError::Timeout),
        }
    }

    /// Cancel the queue.
    ///
    /// Every caller parked in a put or take wakes up and fails, and every
    /// later operation fails immediately. Resident items stay put and can be
    /// recovered with [`drain`](Self::drain). Cancelling twice is a no-op.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if state.cancelled {
            return;
        }
        state.cancelled = true;
        let resident = state.count;
        drop(state);

        debug!(resident, capacity = self.capacity, "queue cancelled");
        self.space_available.notify_all();
        self.item_available.notify_all();
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Remove every resident item, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.state.lock();
        let mut items = Vec::with_capacity(state.count);
        while !state.is_empty() {
            items.push(state.pop().1);
        }
        drop(state);

        if !items.is_empty() {
            debug!(drained = items.len(), "queue drained");
            self.space_available.notify_all();
        }
        items
    }

    /// Maximum number of resident items.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident items at the moment of the call.
    pub fn len(&self) -> usize {
        self.state.lock().count
    }

    /// Whether no item is resident at the moment of the call.
    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    /// Whether every slot is occupied at the moment of the call.
    pub fn is_full(&self) -> bool {
        self.state.lock().is_full()
    }

    fn insert(&self, mut state: MutexGuard<'_, State<T>>, item: T) -> usize {
        let slot = state.push(item);
        drop(state);
        self.item_available.notify_one();
        slot
    }

    fn remove(&self, mut state: MutexGuard<'_, State<T>>) -> (usize, T) {
        let taken = state.pop();
        drop(state);
        self.space_available.notify_one();
        taken
    }

    fn wait_for_space(&self, state: &mut MutexGuard<'_, State<T>>, deadline: Option<Instant>) -> Wait {
        Self::wait_while(state, &self.space_available, State::is_full, deadline, "space")
    }

    fn wait_for_item(&self, state: &mut MutexGuard<'_, State<T>>, deadline: Option<Instant>) -> Wait {
        Self::wait_while(state, &self.item_available, State::is_empty, deadline, "item")
    }

    /// Park on `condvar` until `blocked` no longer holds, the queue is
    /// cancelled, or `deadline` passes. The condition is re-checked after
    /// every wakeup, so spurious and stolen wakeups just loop.
    fn wait_while(
        state: &mut MutexGuard<'_, State<T>>,
        condvar: &Condvar,
        blocked: fn(&State<T>) -> bool,
        deadline: Option<Instant>,
        waiting_for: &'static str,
    ) -> Wait {
        loop {
            if state.cancelled {
                return Wait::Cancelled;
            }
            if !blocked(state) {
                return Wait::Ready;
            }
            trace!(waiting_for, resident = state.count, "parking");
            match deadline {
                None => condvar.wait(state),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Wait::TimedOut;
                    }
                    condvar.wait_until(state, deadline);
                }
            }
        }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.count)
            .field("head", &state.head)
            .field("tail", &state.tail)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}
