//! oxdisk - storage benchmark for a directory's backing device.

// Use mimalloc for reduced allocation latency (enabled by default).
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod cli;
mod output;
mod progress;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command, RunArgs};
use owo_colors::OwoColorize;
use oxdisk_core::{
    Engine, EngineConfig, HistoryStore, JsonlHistoryStore, WorkerEvent, WorkloadConfig, WorkloadRegistry,
};
use progress::LiveProgress;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log lines go through the indicatif writer so they land above spinners.
    // Respect RUST_LOG if set, otherwise use default based on verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });

    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(indicatif_layer.get_stderr_writer()),
        )
        .with(indicatif_layer)
        .with(filter)
        .init();

    let color = cli.use_color();
    match &cli.command {
        Command::Run(args) => run(args, cli.history_path()?, color),
        Command::List => {
            let registry = WorkloadRegistry::with_defaults(WorkloadConfig::default());
            println!("{}", output::workloads_table(&registry));
            Ok(())
        }
        Command::History { limit } => history(cli.history_path()?, *limit),
    }
}

fn run(args: &RunArgs, history_path: PathBuf, color: bool) -> Result<()> {
    let requests = args.requests();
    if requests.is_empty() {
        bail!("No tests selected");
    }

    let interrupted = install_interrupt_flag();

    let config: EngineConfig = args.engine_config();
    let history: Arc<dyn HistoryStore> = Arc::new(JsonlHistoryStore::new(history_path));
    let mut engine = Engine::builder(config)
        .history(history)
        .start()
        .context("Failed to start benchmark engine")?;

    let header = format!("Benchmarking {}", args.target.display());
    if color {
        println!("{}", header.bold());
    } else {
        println!("{header}");
    }

    let mut live = LiveProgress::new(requests.len(), color);
    for request in requests {
        engine
            .submit(request)
            .context("Failed to submit benchmark")?;
    }

    let mut statuses = Vec::new();
    let mut discarded = false;
    while let Some(event) = engine.next_event()? {
        if !discarded && interrupted.load(Ordering::SeqCst) {
            discarded = true;
            let dropped = engine.discard_pending();
            live.interrupted(dropped);
        }
        match event {
            WorkerEvent::Status(status) if status.finished => {
                live.finish(&status);
                statuses.push(status);
            }
            WorkerEvent::Status(status) => live.update(&status),
            WorkerEvent::Released { .. } => {}
        }
    }
    drop(live);
    engine.shutdown().context("Benchmark worker did not stop cleanly")?;

    println!();
    println!("{}", output::results_table(&statuses, color));

    if let Some(path) = &args.json {
        output::export_json(&statuses, path)?;
        println!("Results written to {}", path.display());
    }

    let failed = statuses.iter().filter(|s| !s.success).count();
    if failed > 0 {
        bail!("{failed} of {} benchmark(s) failed", statuses.len());
    }
    Ok(())
}

/// Flag raised by Ctrl+C. Queued benchmarks are discarded once it is set;
/// the running one finishes and cleans up.
fn install_interrupt_flag() -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl+C handler; interrupting will not discard queued benchmarks");
    }
    interrupted
}

fn history(path: PathBuf, limit: usize) -> Result<()> {
    let store = JsonlHistoryStore::new(path);
    let results = store
        .recent(limit)
        .with_context(|| format!("Failed to read history from {}", store.path().display()))?;
    if results.is_empty() {
        println!("No results in {}", store.path().display());
        return Ok(());
    }
    println!("{}", output::history_table(&results));
    Ok(())
}
