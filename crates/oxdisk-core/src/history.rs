//! Persistence of completed results.

use crate::result::BenchmarkResult;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Where the worker records successful results.
pub trait HistoryStore: Send + Sync {
    fn append(&self, result: &BenchmarkResult) -> Result<()>;

    /// All stored results, oldest first.
    fn load(&self) -> Result<Vec<BenchmarkResult>>;

    /// The newest `limit` results, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<BenchmarkResult>> {
        let mut all = self.load()?;
        all.reverse();
        all.truncate(limit);
        Ok(all)
    }
}

/// One JSON record per line.
pub struct JsonlHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonlHistoryStore {
    fn append(&self, result: &BenchmarkResult) -> Result<()> {
        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut line = serde_json::to_string(result).context("Failed to serialize result")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn load(&self) -> Result<Vec<BenchmarkResult>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to open {}", self.path.display()));
            }
        };

        let mut results = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", self.path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(result) => results.push(result),
                Err(e) => warn!(line = index + 1, error = %e, "Skipping malformed history record"),
            }
        }
        Ok(results)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHistory;

impl HistoryStore for NullHistory {
    fn append(&self, _result: &BenchmarkResult) -> Result<()> {
        Ok(())
    }

    fn load(&self) -> Result<Vec<BenchmarkResult>> {
        Ok(Vec::new())
    }
}
