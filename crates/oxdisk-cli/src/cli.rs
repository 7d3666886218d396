//! Command-line interface.

// Allow CLI-specific patterns
#![allow(clippy::struct_excessive_bools)]

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use oxdisk_core::{BenchRequest, EngineConfig, TestType, WarmupConfig, WorkloadConfig};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Storage benchmark: sequential, random, mixed and metadata workloads
/// against a target directory, one benchmark at a time.
#[derive(Parser, Debug)]
#[command(name = "oxdisk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// History file (JSON lines).
    ///
    /// Defaults to <data dir>/oxdisk/history.jsonl.
    #[arg(long, global = true, env = "OXDISK_HISTORY", value_name = "PATH")]
    pub history: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true, conflicts_with = "color")]
    pub no_color: bool,

    /// Force colored output (even when not a TTY).
    #[arg(long, global = true, conflicts_with = "no_color")]
    pub color: bool,

    /// Verbose output.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run benchmarks against a directory.
    Run(RunArgs),

    /// List the available workloads.
    List,

    /// Show recent results.
    History {
        /// Number of results to show.
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory to benchmark. Scratch files are created and removed inside it.
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Test to run. Can be given multiple times; runs the whole catalog if omitted.
    ///
    /// Valid values: seq-write, seq-read, rand-write, rand-read, mixed, metadata, churn
    #[arg(short = 't', long = "test", value_name = "TEST")]
    pub tests: Vec<TestType>,

    /// Passes per test (1-20). Defaults to each workload's suggestion.
    #[arg(short = 'p', long)]
    pub passes: Option<u32>,

    /// Block size in bytes. Defaults to each workload's suggestion.
    #[arg(short = 'b', long, value_name = "BYTES")]
    pub block_size: Option<u32>,

    /// Drop the fastest and slowest pass before averaging (needs 3+ valid passes).
    #[arg(long)]
    pub trimmed: bool,

    /// Flush the OS disk cache before each test (usually needs root).
    #[arg(long)]
    pub flush_cache: bool,

    /// Skip the cache warmup before each test.
    #[arg(long)]
    pub no_warmup: bool,

    /// Scale factor for workload sizes (0.01-1.0).
    #[arg(long, default_value = "1.0")]
    pub scale: f64,

    /// Export results and time series to a JSON file.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

impl Cli {
    pub fn use_color(&self) -> bool {
        if self.color {
            return true;
        }
        !self.no_color && std::io::stdout().is_terminal()
    }

    pub fn history_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.history {
            return Ok(path.clone());
        }
        match dirs::data_dir() {
            Some(dir) => Ok(dir.join("oxdisk").join("history.jsonl")),
            None => bail!("Cannot determine data directory; pass --history"),
        }
    }
}

impl RunArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            warmup: WarmupConfig {
                enabled: !self.no_warmup,
                ..WarmupConfig::default()
            },
            workload: WorkloadConfig::new(self.scale),
            ..EngineConfig::default()
        }
    }

    /// One request per selected test, in catalog order when none were given.
    pub fn requests(&self) -> Vec<BenchRequest> {
        let tests = if self.tests.is_empty() {
            TestType::all()
        } else {
            self.tests.clone()
        };
        tests
            .into_iter()
            .map(|test| BenchRequest {
                test_type: test,
                target: self.target.clone(),
                pass_count: self.passes,
                block_size: self.block_size,
                trimmed: self.trimmed,
                flush_cache: self.flush_cache,
            })
            .collect()
    }
}
