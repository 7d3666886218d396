//! Benchmark workloads.
//!
//! A workload describes one I/O pattern. [`Workload::setup`] prepares a
//! [`WorkloadHandle`] against a target directory; the pass runner then calls
//! [`WorkloadHandle::run`] once per pass and finally consumes the handle with
//! [`WorkloadHandle::cleanup`]. Adding a pattern to the catalog means adding a
//! `Workload` implementation and registering it; the pass runner is unaffected.

mod churn;
mod metadata;
mod random;
mod sequential;

pub use churn::DirectoryChurnWorkload;
pub use metadata::MetadataWorkload;
pub use random::{MixedRandomWorkload, RandomAccessWorkload};
pub use sequential::{SequentialReadWorkload, SequentialWriteWorkload};

use crate::config::{DefaultSettings, TestType};
use crate::platform::is_ram_filesystem;
use anyhow::Result;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Data sets are divided by this factor on RAM-backed targets.
pub const RAM_DISK_DIVISOR: u64 = 8;

/// Bytes and operations moved by one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutput {
    pub bytes_processed: u64,
    pub op_count: u64,
}

/// Directory a benchmark runs against, with what is known about its filesystem.
#[derive(Debug, Clone)]
pub struct Target {
    pub path: PathBuf,
    pub filesystem: String,
}

impl Target {
    pub fn new(path: impl Into<PathBuf>, filesystem: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filesystem: filesystem.into(),
        }
    }

    /// Whether the target lives in RAM (tmpfs and friends).
    pub fn is_ram_backed(&self) -> bool {
        is_ram_filesystem(&self.filesystem)
    }

    /// Shrink a data-set size on RAM-backed targets so it does not exhaust memory.
    pub fn data_set_bytes(&self, bytes: u64, min: u64) -> u64 {
        if self.is_ram_backed() {
            (bytes / RAM_DISK_DIVISOR).max(min)
        } else {
            bytes
        }
    }
}

/// An I/O pattern that can be benchmarked.
pub trait Workload: Send + Sync {
    fn test_type(&self) -> TestType;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Block size and pass count used when the caller does not override them.
    fn default_settings(&self) -> DefaultSettings;

    /// Allocate per-run state against `target`.
    ///
    /// Fails if any allocation or precondition fails; in that case nothing is
    /// left behind on the target.
    fn setup(&self, target: &Target, block_size: u32) -> Result<Box<dyn WorkloadHandle>>;
}

/// Per-run state produced by [`Workload::setup`].
pub trait WorkloadHandle: Send {
    /// Perform exactly one pass. Must be repeatable against the same state.
    fn run(&mut self) -> Result<PassOutput>;

    /// Release all state and delete temporary files.
    fn cleanup(self: Box<Self>) -> Result<()>;
}

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Create a uniquely named scratch directory under `target`.
pub(crate) fn create_scratch_dir(target: &Path, prefix: &str) -> io::Result<PathBuf> {
    let pid = std::process::id();
    let seq = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = target.join(format!(".oxdisk_{prefix}_{pid}_{seq}"));
    std::fs::create_dir(&dir)?;
    Ok(dir)
}

/// Remove a scratch directory, tolerating it already being gone.
pub(crate) fn remove_scratch_dir(dir: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Buffer of deterministic pseudo-random bytes.
pub(crate) fn random_buffer(len: usize, seed: u64) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len)?;
    buffer.resize(len, 0);
    ChaCha8Rng::seed_from_u64(seed).fill_bytes(&mut buffer);
    Ok(buffer)
}

/// Create `path` holding `bytes` bytes of repeated `chunk`, synced to disk.
pub(crate) fn fill_file(path: &Path, chunk: &[u8], bytes: u64) -> Result<()> {
    let mut file = File::create(path)?;
    let mut written = 0u64;
    while written < bytes {
        let len = usize::try_from(bytes - written).unwrap_or(usize::MAX).min(chunk.len());
        file.write_all(&chunk[..len])?;
        written += len as u64;
    }
    sync_file(&file)?;
    Ok(())
}

/// Flush a file to stable storage.
///
/// Returns `Ok(false)` if the filesystem only accepted a partial sync.
pub(crate) fn sync_file(file: &File) -> io::Result<bool> {
    // ENOTTY - "Inappropriate ioctl for device"
    const ENOTTY: i32 = 25;

    match file.sync_all() {
        Ok(()) => Ok(true),
        Err(e) if e.raw_os_error() == Some(ENOTTY) => match file.sync_data() {
            Ok(()) => Ok(false),
            Err(e2) if e2.raw_os_error() == Some(ENOTTY) => Ok(false),
            Err(e2) => Err(e2),
        },
        Err(e) => Err(e),
    }
}

/// Reject block sizes a workload cannot use.
pub(crate) fn validate_block_size(block_size: u32) -> Result<usize> {
    if block_size == 0 {
        anyhow::bail!("block size must be greater than zero");
    }
    Ok(block_size as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_backed_data_set() {
        let ram = Target::new("/tmp", "tmpfs");
        let disk = Target::new("/data", "ext4");
        assert_eq!(ram.data_set_bytes(64 << 20, 1 << 20), 8 << 20);
        assert_eq!(ram.data_set_bytes(4 << 20, 1 << 20), 1 << 20);
        assert_eq!(disk.data_set_bytes(64 << 20, 1 << 20), 64 << 20);
    }

    #[test]
    fn test_scratch_dirs_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = create_scratch_dir(dir.path(), "t").unwrap();
        let b = create_scratch_dir(dir.path(), "t").unwrap();
        assert_ne!(a, b);
        remove_scratch_dir(&a).unwrap();
        remove_scratch_dir(&a).unwrap();
        assert!(!a.exists());
        assert!(b.exists());
    }

    #[test]
    fn test_random_buffer_is_deterministic() {
        let a = random_buffer(4096, 7).unwrap();
        let b = random_buffer(4096, 7).unwrap();
        let c = random_buffer(4096, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        assert!(validate_block_size(0).is_err());
        assert_eq!(validate_block_size(4096).unwrap(), 4096);
    }
}
