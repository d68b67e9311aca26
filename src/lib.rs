//! ringlock - blocking bounded MPMC ring buffer
//!
//! A fixed-capacity circular queue behind one mutex and two condition
//! variables. Producers block while it is full, consumers block while it is
//! empty, and values come out in global insertion order. Cancelling the
//! queue wakes every blocked caller with a distinguishable error, which is
//! what lets the worker [`harness`] shut down in finite time.
//!
//! Run the model-checked tests with:
//!
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test --test loom_tests --release
//! ```
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod harness;
mod queue;
mod sync;

pub use config::{HarnessConfig, ThinkTime};
pub use error::{
    CapacityError, ConfigError, PutError, PutTimeoutError, TakeError, TakeTimeoutError,
    TryPutError, TryTakeError,
};
pub use event::{Event, EventSink, RecordingSink, Role, TracingSink};
pub use harness::{Harness, HarnessError, Report, StopSignal, Transactions, ValueSource};
pub use queue::BoundedQueue;
