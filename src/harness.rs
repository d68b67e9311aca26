//! Producer and consumer worker threads around a shared [`BoundedQueue`].
//!
//! Producers draw values from a [`ValueSource`] and `put` them; consumers
//! `take` them back out. Every successful operation is reported to an
//! [`EventSink`]. Workers stop when their queue operation is cancelled or the
//! [`StopSignal`] is raised, which [`Harness::shutdown`] does for them.

use std::ops::RangeInclusive;
use std::panic;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{HarnessConfig, ThinkTime};
use crate::error::ConfigError;
use crate::event::{Event, EventSink, Role};
use crate::queue::BoundedQueue;

/// Where producers get their values from.
pub trait ValueSource<T>: Send {
    /// Next value for producer `worker` (1-based) to put.
    fn next_value(&mut self, worker: usize) -> T;
}

impl<T, F> ValueSource<T> for F
where
    F: FnMut(usize) -> T + Send,
{
    fn next_value(&mut self, worker: usize) -> T {
        self(worker)
    }
}

/// Uniformly random transaction amounts, 1 to 100 by default.
#[derive(Debug, Clone)]
pub struct Transactions {
    rng: StdRng,
    amounts: RangeInclusive<u32>,
}

impl Transactions {
    /// Amounts from an entropy-seeded generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible amounts from a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Draw amounts from `amounts` instead of 1 to 100.
    pub fn with_amounts(mut self, amounts: RangeInclusive<u32>) -> Result<Self, ConfigError> {
        if amounts.is_empty() {
            return Err(ConfigError::EmptyAmounts { start: *amounts.start(), end: *amounts.end() });
        }
        self.amounts = amounts;
        Ok(self)
    }

    fn with_rng(rng: StdRng) -> Self {
        Transactions { rng, amounts: 1..=100 }
    }
}

impl Default for Transactions {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueSource<u32> for Transactions {
    fn next_value(&mut self, _worker: usize) -> u32 {
        self.rng.gen_range(self.amounts.clone())
    }
}

/// Sticky stop flag that also interrupts worker pauses.
#[derive(Debug, Default)]
pub struct StopSignal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    /// A signal that is not raised yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake every sleeper.
    pub fn raise(&self) {
        *self.raised.lock() = true;
        self.cond.notify_all();
    }

    /// Whether [`raise`](Self::raise) has been called.
    pub fn is_raised(&self) -> bool {
        *self.raised.lock()
    }

    /// Sleep for `pause` unless the signal is raised first.
    /// Returns `true` if the signal is raised.
    pub fn sleep(&self, pause: Duration) -> bool {
        let mut raised = self.raised.lock();
        if pause.is_zero() || *raised {
            return *raised;
        }
        let Some(deadline) = Instant::now().checked_add(pause) else {
            while !*raised {
                self.cond.wait(&mut raised);
            }
            return true;
        };
        while !*raised {
            if self.cond.wait_until(&mut raised, deadline).timed_out() {
                break;
            }
        }
        *raised
    }
}

/// Why a harness could not be started.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The config failed validation.
    #[error("invalid harness config: {0}")]
    Config(#[from] ConfigError),
    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Outcome of a harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report<T> {
    /// Successful puts across all producers.
    pub produced: u64,
    /// Successful takes across all consumers.
    pub consumed: u64,
    /// Items still in the queue at shutdown, oldest first.
    pub residual: Vec<T>,
}

impl<T> Report<T> {
    /// Every produced item was either consumed or is still resident.
    pub fn is_balanced(&self) -> bool {
        self.produced == self.consumed + self.residual.len() as u64
    }
}

struct Worker<T> {
    role: Role,
    id: usize,
    queue: Arc<BoundedQueue<T>>,
    sink: Arc<dyn EventSink<T>>,
    stop: Arc<StopSignal>,
    think_time: ThinkTime,
    rng: StdRng,
}

impl<T> Worker<T> {
    fn pause(&mut self) -> bool {
        if self.think_time.is_none() {
            return self.stop.is_raised();
        }
        let pause = self.think_time.sample(&mut self.rng);
        self.stop.sleep(pause)
    }

    fn produce<S: ValueSource<T>>(mut self, mut source: S, limit: Option<u64>) -> u64
    where
        T: Clone,
    {
        debug!(worker = self.id, "producer started");
        let mut produced = 0u64;
        while limit.map_or(true, |limit| produced < limit) && !self.stop.is_raised() {
            let value = source.next_value(self.id);
            let (role, worker, sink) = (self.role, self.id, &self.sink);
            let put = self.queue.put_with(value, |slot, value| {
                sink.record(&Event { role, worker, value: value.clone(), slot });
            });
            if put.is_err() {
                break;
            }
            produced += 1;
            // No pause after the last item, so bounded runs finish promptly.
            if limit.is_some_and(|limit| produced >= limit) || self.pause() {
                break;
            }
        }
        debug!(worker = self.id, produced, "producer stopped");
        produced
    }

    fn consume(mut self) -> u64
    where
        T: Clone,
    {
        debug!(worker = self.id, "consumer started");
        let mut consumed = 0u64;
        loop {
            let (role, worker, sink) = (self.role, self.id, &self.sink);
            let taken = self.queue.take_with(|slot, value| {
                sink.record(&Event { role, worker, value: value.clone(), slot });
            });
            if taken.is_err() {
                break;
            }
            consumed += 1;
            if self.pause() {
                break;
            }
        }
        debug!(worker = self.id, consumed, "consumer stopped");
        consumed
    }
}

/// A running set of producer and consumer threads.
pub struct Harness<T> {
    queue: Arc<BoundedQueue<T>>,
    stop: Arc<StopSignal>,
    producers: Vec<JoinHandle<u64>>,
    consumers: Vec<JoinHandle<u64>>,
    produced: u64,
}

impl<T> Harness<T>
where
    T: Clone + Send + 'static,
{
    /// Validate `config`, create the queue and spawn the workers.
    ///
    /// `make_source` is called once per producer with its 1-based id.
    pub fn start<S, F>(
        config: &HarnessConfig,
        mut make_source: F,
        sink: Arc<dyn EventSink<T>>,
    ) -> Result<Self, HarnessError>
    where
        S: ValueSource<T> + 'static,
        F: FnMut(usize) -> S,
    {
        config.validate()?;
        let queue = Arc::new(BoundedQueue::new(config.capacity));
        let mut harness = Harness {
            queue,
            stop: Arc::new(StopSignal::new()),
            producers: Vec::with_capacity(config.producers),
            consumers: Vec::with_capacity(config.consumers),
            produced: 0,
        };

        for id in 1..=config.producers {
            let worker = harness.worker(Role::Producer, id, config.think_time, &sink);
            let source = make_source(id);
            let limit = config.items_per_producer;
            let spawned = thread::Builder::new()
                .name(format!("producer-{id}"))
                .spawn(move || worker.produce(source, limit));
            match spawned {
                Ok(handle) => harness.producers.push(handle),
                Err(err) => {
                    harness.shutdown();
                    return Err(err.into());
                }
            }
        }
        for id in 1..=config.consumers {
            let worker = harness.worker(Role::Consumer, id, config.think_time, &sink);
            let spawned = thread::Builder::new()
                .name(format!("consumer-{id}"))
                .spawn(move || worker.consume());
            match spawned {
                Ok(handle) => harness.consumers.push(handle),
                Err(err) => {
                    harness.shutdown();
                    return Err(err.into());
                }
            }
        }

        info!(
            capacity = config.capacity,
            producers = config.producers,
            consumers = config.consumers,
            "harness started"
        );
        Ok(harness)
    }

    fn worker(
        &self,
        role: Role,
        id: usize,
        think_time: ThinkTime,
        sink: &Arc<dyn EventSink<T>>,
    ) -> Worker<T> {
        Worker {
            role,
            id,
            queue: Arc::clone(&self.queue),
            sink: Arc::clone(sink),
            stop: Arc::clone(&self.stop),
            think_time,
            rng: StdRng::from_entropy(),
        }
    }

    /// The queue shared by every worker.
    pub fn queue(&self) -> &Arc<BoundedQueue<T>> {
        &self.queue
    }

    /// Join every producer. Only returns on its own when producers are
    /// bounded by `items_per_producer`.
    pub fn wait_producers(&mut self) -> u64 {
        self.produced += join_all(self.producers.drain(..));
        self.produced
    }

    /// Stop every worker, cancel the queue and collect what is left in it.
    ///
    /// A panic in any worker is resumed here.
    pub fn shutdown(mut self) -> Report<T> {
        self.stop.raise();
        self.queue.cancel();
        let produced = self.wait_producers();
        let consumed = join_all(self.consumers.drain(..));
        let residual = self.queue.drain();
        info!(produced, consumed, residual = residual.len(), "harness stopped");
        Report { produced, consumed, residual }
    }
}

// Dropping without `shutdown` still stops the workers, it just doesn't wait for them.
impl<T> Drop for Harness<T> {
    fn drop(&mut self) {
        self.stop.raise();
        self.queue.cancel();
    }
}

fn join_all(handles: impl Iterator<Item = JoinHandle<u64>>) -> u64 {
    handles
        .map(|handle| match handle.join() {
            Ok(count) => count,
            Err(payload) => panic::resume_unwind(payload),
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transactions_stay_in_range() {
        let mut source = Transactions::seeded(42);
        for _ in 0..1000 {
            let amount = source.next_value(1);
            assert!((1..=100).contains(&amount));
        }
        let mut narrow = Transactions::seeded(1).with_amounts(7..=7).unwrap();
        assert_eq!(narrow.next_value(1), 7);
    }

    #[test]
    fn empty_amount_range_is_rejected() {
        #[allow(clippy::reversed_empty_ranges)]
        let err = Transactions::seeded(1).with_amounts(10..=5).unwrap_err();
        assert_eq!(err, ConfigError::EmptyAmounts { start: 10, end: 5 });
    }

    #[test]
    fn closures_are_sources() {
        let mut next = 0;
        let mut source = move |worker: usize| {
            next += 1;
            worker * 100 + next
        };
        assert_eq!(ValueSource::next_value(&mut source, 2), 201);
        assert_eq!(ValueSource::next_value(&mut source, 2), 202);
    }

    #[test]
    fn stop_signal_interrupts_sleep() {
        let stop = Arc::new(StopSignal::new());
        let sleeper = {
            let stop = stop.clone();
            thread::spawn(move || stop.sleep(Duration::from_secs(60)))
        };
        thread::sleep(Duration::from_millis(20));
        stop.raise();
        assert!(sleeper.join().unwrap());
        assert!(stop.is_raised());
    }

    #[test]
    fn stop_signal_sleep_times_out() {
        let stop = StopSignal::new();
        assert!(!stop.sleep(Duration::from_millis(5)));
        assert!(!stop.sleep(Duration::ZERO));
    }

    #[test]
    fn report_balance() {
        let report = Report { produced: 5, consumed: 3, residual: vec![1, 2] };
        assert!(report.is_balanced());
    }
}
