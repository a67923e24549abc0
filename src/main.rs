//! Flakegen: time-ordered 64-bit id generator.
//!
//! # Usage
//!
//! ```bash
//! flakegen --node-id 1 next --count 5
//! flakegen --node-id 1 --state-file ./flakegen.state stream --interval-ms 500
//! flakegen decode 515899392
//! ```
//!
//! Environment variables can also be used:
//! - `FLAKEGEN_NODE_ID`: Node id of this generator
//! - `FLAKEGEN_STATE_FILE`: File holding the last issued timestamp
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use flakegen::config::{Command, Config, OutputFormat};
use flakegen::observability::tracing::init_tracing;
use flakegen::shutdown::{
    install_panic_flush, spawn_save_on_shutdown, spawn_signal_listener, FlushGuard,
};
use flakegen::{DecodedId, Generator, GeneratorOptions, Layout, SystemClock};

/// One id with its decoded fields, for JSON output.
#[derive(Serialize)]
struct IdRecord {
    id: i64,
    #[serde(flatten)]
    decoded: DecodedId,
    datetime: Option<String>,
}

impl IdRecord {
    fn new(id: i64, layout: &Layout) -> Self {
        let decoded = layout.decode(id);
        Self {
            id,
            decoded,
            datetime: decoded.datetime().map(|dt| dt.to_rfc3339()),
        }
    }
}

fn print_id(id: i64, layout: &Layout, output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Text => println!("{id}"),
        OutputFormat::Json => println!("{}", serde_json::to_string(&IdRecord::new(id, layout))?),
    }
    Ok(())
}

fn print_decoded(id: i64, layout: &Layout, output: OutputFormat) -> anyhow::Result<()> {
    let record = IdRecord::new(id, layout);
    match output {
        OutputFormat::Text => {
            println!("id:              {}", record.id);
            println!("timestamp delta: {}", record.decoded.timestamp_delta);
            println!("timestamp (ms):  {}", record.decoded.timestamp_millis);
            if let Some(datetime) = &record.datetime {
                println!("time:            {datetime}");
            }
            println!("node id:         {}", record.decoded.node_id);
            println!("sequence:        {}", record.decoded.sequence);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
    }
    Ok(())
}

/// Emit ids every `interval` until a signal arrives or `limit` is reached.
async fn run_stream(
    generator: Arc<Generator>,
    interval: Duration,
    limit: Option<u64>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let _listener = spawn_signal_listener(shutdown_tx);

    let save_task = generator
        .is_persistent()
        .then(|| spawn_save_on_shutdown(Arc::clone(&generator), shutdown_rx.clone()));

    let layout = generator.layout();
    let mut ticker = tokio::time::interval(interval);
    let mut issued = 0u64;

    while limit.map_or(true, |limit| issued < limit) {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => break,
        }

        // May spin on the clock, keep it off the async workers
        let worker = Arc::clone(&generator);
        let id = tokio::task::spawn_blocking(move || worker.next_id()).await??;
        print_id(id, &layout, output)?;
        issued += 1;
    }

    if *shutdown_rx.borrow() {
        if let Some(save_task) = save_task {
            save_task.await?;
        }
    }

    tracing::info!(issued, "Stream stopped");
    Ok(())
}

/// Ids issued between shutdown checks in `next`.
const NEXT_CHUNK: usize = 4096;

/// Issue `count` ids, stopping early once a signal arrives.
///
/// The caller's [`FlushGuard`] saves state after this returns, on either path.
async fn run_next(
    generator: Arc<Generator>,
    count: usize,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let _listener = spawn_signal_listener(shutdown_tx);

    // May spin on the clock, keep it off the async workers
    let issued = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
        let layout = generator.layout();
        let mut issued = 0;
        while issued < count {
            if *shutdown_rx.borrow() {
                tracing::info!(issued, count, "Interrupted, stopping early");
                break;
            }
            let chunk = (count - issued).min(NEXT_CHUNK);
            for id in generator.next_batch(chunk)? {
                print_id(id, &layout, output)?;
            }
            issued += chunk;
        }
        Ok(issued)
    })
    .await??;

    tracing::info!(issued, "Issued ids");
    Ok(())
}

/// Build the configured generator, flushed on every exit path from here on.
fn open_generator(
    config: &Config,
    options: GeneratorOptions,
) -> anyhow::Result<FlushGuard<SystemClock>> {
    let mut builder = Generator::builder(config.node_id).options(options);
    if let Some(state_file) = &config.state_file {
        builder = builder.state_file(state_file);
    }
    let generator = Arc::new(builder.build().context("failed to create generator")?);

    if generator.is_persistent() {
        install_panic_flush(Arc::clone(&generator));
    }
    Ok(FlushGuard::new(generator))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize tracing/logging
    init_tracing(&config.log_level);

    let options = config.generator_options().context("invalid id layout")?;

    match config.command {
        Command::Decode { id } => print_decoded(id, &options.layout, config.output)?,
        Command::Next { count } => {
            let guard = open_generator(&config, options)?;
            run_next(guard.generator(), count, config.output).await?;
        }
        Command::Stream { interval_ms, limit } => {
            let guard = open_generator(&config, options)?;
            run_stream(
                guard.generator(),
                Duration::from_millis(interval_ms),
                limit,
                config.output,
            )
            .await?;
        }
    }

    tracing::info!("Flakegen shutdown complete");
    Ok(())
}
