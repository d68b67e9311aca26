//! Transaction queue demo: producers post random amounts, consumers settle them.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ringlock::{Harness, HarnessConfig, ThinkTime, TracingSink, Transactions};

#[derive(Debug, Parser)]
#[command(name = "ringlock", about = "Run producers and consumers over a bounded transaction queue")]
struct Args {
    /// Queue capacity
    #[arg(long, default_value_t = 5)]
    capacity: usize,

    /// Number of producer threads
    #[arg(long, default_value_t = 3)]
    producers: usize,

    /// Number of consumer threads
    #[arg(long, default_value_t = 3)]
    consumers: usize,

    /// Shortest pause between two operations of a worker
    #[arg(long, default_value_t = 1000)]
    min_think_ms: u64,

    /// Longest pause between two operations of a worker
    #[arg(long, default_value_t = 2000)]
    max_think_ms: u64,

    /// Stop each producer after this many transactions
    #[arg(long)]
    items: Option<u64>,

    /// Run time before shutting everything down
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,
}

impl Args {
    fn config(&self) -> HarnessConfig {
        HarnessConfig {
            capacity: self.capacity,
            producers: self.producers,
            consumers: self.consumers,
            think_time: ThinkTime::between(
                Duration::from_millis(self.min_think_ms),
                Duration::from_millis(self.max_think_ms),
            ),
            items_per_producer: self.items,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ringlock=info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = args.config();
    let harness = Harness::<u32>::start(&config, |_| Transactions::new(), Arc::new(TracingSink))
        .context("starting workers")?;

    thread::sleep(Duration::from_secs(args.duration_secs));

    let report = harness.shutdown();
    info!(
        produced = report.produced,
        consumed = report.consumed,
        residual = ?report.residual,
        "run finished"
    );
    Ok(())
}
