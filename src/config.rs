//! Worker harness settings.

use std::time::Duration;

use rand::Rng;

use crate::error::{CapacityError, ConfigError};

/// Pause a worker takes between two operations, drawn uniformly from `min..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    /// Shortest pause.
    pub min: Duration,
    /// Longest pause.
    pub max: Duration,
}

impl ThinkTime {
    /// No pause at all.
    pub const fn none() -> Self {
        ThinkTime { min: Duration::ZERO, max: Duration::ZERO }
    }

    /// Always pause for exactly `pause`.
    pub const fn fixed(pause: Duration) -> Self {
        ThinkTime { min: pause, max: pause }
    }

    /// Pause uniformly between `min` and `max`, inclusive.
    pub const fn between(min: Duration, max: Duration) -> Self {
        ThinkTime { min, max }
    }

    /// Whether workers never pause.
    pub fn is_none(&self) -> bool {
        self.max.is_zero()
    }

    /// Draw one pause length.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

impl Default for ThinkTime {
    /// One to two seconds, the pacing of the classic transaction demo.
    fn default() -> Self {
        ThinkTime::between(Duration::from_secs(1), Duration::from_secs(2))
    }
}

/// Settings for a [`Harness`](crate::Harness) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Queue capacity shared by all workers.
    pub capacity: usize,
    /// Number of producer threads.
    pub producers: usize,
    /// Number of consumer threads.
    pub consumers: usize,
    /// Pause every worker takes after each successful operation.
    pub think_time: ThinkTime,
    /// Stop each producer after this many successful puts. `None` runs until shutdown.
    pub items_per_producer: Option<u64>,
}

impl HarnessConfig {
    /// Check the settings before any thread is spawned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(CapacityError.into());
        }
        if self.producers == 0 {
            return Err(ConfigError::NoProducers);
        }
        if self.consumers == 0 {
            return Err(ConfigError::NoConsumers);
        }
        if self.think_time.min > self.think_time.max {
            return Err(ConfigError::InvertedThinkTime {
                min_ms: self.think_time.min.as_millis(),
                max_ms: self.think_time.max.as_millis(),
            });
        }
        Ok(())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            capacity: 5,
            producers: 3,
            consumers: 3,
            think_time: ThinkTime::default(),
            items_per_producer: None,
        }
    }
}
