//! Sequential read and write workloads.

// Allow numeric casts between file offsets (u64) and buffer lengths (usize)
#![allow(clippy::cast_possible_truncation)]

use super::{
    create_scratch_dir, fill_file, random_buffer, remove_scratch_dir, sync_file,
    validate_block_size, PassOutput, Target, Workload, WorkloadHandle,
};
use crate::config::{DefaultSettings, TestType, WorkloadConfig};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

const BASE_FILE_BYTES: u64 = 256 * 1024 * 1024;
const MIN_FILE_BYTES: u64 = 1024 * 1024;
const DEFAULTS: DefaultSettings = DefaultSettings {
    block_size: 1024 * 1024,
    pass_count: 5,
};

/// Writes a fixed-size file front to back and fsyncs it.
pub struct SequentialWriteWorkload {
    config: WorkloadConfig,
}

impl SequentialWriteWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }
}

struct SequentialWriteHandle {
    dir: PathBuf,
    file: PathBuf,
    buffer: Vec<u8>,
    file_bytes: u64,
}

impl Workload for SequentialWriteWorkload {
    fn test_type(&self) -> TestType {
        TestType::SequentialWrite
    }

    fn name(&self) -> &'static str {
        "Sequential Write"
    }

    fn description(&self) -> &'static str {
        "Writes one large file in block-sized chunks, then fsyncs it"
    }

    fn default_settings(&self) -> DefaultSettings {
        DEFAULTS
    }

    fn setup(&self, target: &Target, block_size: u32) -> Result<Box<dyn WorkloadHandle>> {
        let block = validate_block_size(block_size)?;
        let file_bytes = target.data_set_bytes(
            self.config.scale_bytes(BASE_FILE_BYTES, MIN_FILE_BYTES),
            MIN_FILE_BYTES,
        );
        let buffer = random_buffer(block, 42)?;
        let dir = create_scratch_dir(&target.path, "seqw")
            .with_context(|| format!("Failed to create scratch dir in {}", target.path.display()))?;

        Ok(Box::new(SequentialWriteHandle {
            file: dir.join("seq_write.bin"),
            dir,
            buffer,
            file_bytes,
        }))
    }
}

impl WorkloadHandle for SequentialWriteHandle {
    fn run(&mut self) -> Result<PassOutput> {
        let mut file = File::create(&self.file)?;
        let mut written = 0u64;
        let mut ops = 0u64;

        while written < self.file_bytes {
            let len = (self.file_bytes - written).min(self.buffer.len() as u64) as usize;
            file.write_all(&self.buffer[..len])?;
            written += len as u64;
            ops += 1;
        }
        sync_file(&file)?;

        Ok(PassOutput {
            bytes_processed: written,
            op_count: ops,
        })
    }

    fn cleanup(self: Box<Self>) -> Result<()> {
        remove_scratch_dir(&self.dir)
            .with_context(|| format!("Failed to remove {}", self.dir.display()))
    }
}

/// Reads a prepared file front to back.
pub struct SequentialReadWorkload {
    config: WorkloadConfig,
}

impl SequentialReadWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }
}

struct SequentialReadHandle {
    dir: PathBuf,
    file: PathBuf,
    buffer: Vec<u8>,
    file_bytes: u64,
}

impl Workload for SequentialReadWorkload {
    fn test_type(&self) -> TestType {
        TestType::SequentialRead
    }

    fn name(&self) -> &'static str {
        "Sequential Read"
    }

    fn description(&self) -> &'static str {
        "Reads one large prepared file in block-sized chunks"
    }

    fn default_settings(&self) -> DefaultSettings {
        DEFAULTS
    }

    fn setup(&self, target: &Target, block_size: u32) -> Result<Box<dyn WorkloadHandle>> {
        let block = validate_block_size(block_size)?;
        let file_bytes = target.data_set_bytes(
            self.config.scale_bytes(BASE_FILE_BYTES, MIN_FILE_BYTES),
            MIN_FILE_BYTES,
        );
        let content = random_buffer(block, 43)?;
        let dir = create_scratch_dir(&target.path, "seqr")
            .with_context(|| format!("Failed to create scratch dir in {}", target.path.display()))?;
        let file = dir.join("seq_read.bin");

        let prepared = fill_file(&file, &content, file_bytes);
        if let Err(e) = prepared {
            let _ = remove_scratch_dir(&dir);
            return Err(e.context("Failed to prepare sequential read file"));
        }

        Ok(Box::new(SequentialReadHandle {
            dir,
            file,
            buffer: vec![0u8; block],
            file_bytes,
        }))
    }
}

impl WorkloadHandle for SequentialReadHandle {
    fn run(&mut self) -> Result<PassOutput> {
        let mut file = File::open(&self.file)?;
        let mut total = 0u64;
        let mut ops = 0u64;

        loop {
            let n = file.read(&mut self.buffer)?;
            if n == 0 {
                break;
            }
            total += n as u64;
            ops += 1;
            std::hint::black_box(&self.buffer[..n]);
        }

        if total != self.file_bytes {
            anyhow::bail!("Read {} bytes, expected {}", total, self.file_bytes);
        }

        Ok(PassOutput {
            bytes_processed: total,
            op_count: ops,
        })
    }

    fn cleanup(self: Box<Self>) -> Result<()> {
        remove_scratch_dir(&self.dir)
            .with_context(|| format!("Failed to remove {}", self.dir.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_target(dir: &tempfile::TempDir) -> Target {
        Target::new(dir.path(), "ext4")
    }

    #[test]
    fn test_sequential_write_pass() {
        let dir = tempfile::tempdir().unwrap();
        let workload = SequentialWriteWorkload::new(WorkloadConfig::new(0.01));
        let mut handle = workload.setup(&small_target(&dir), 256 * 1024).unwrap();

        let out = handle.run().unwrap();
        assert_eq!(out.bytes_processed, 2_684_355);
        assert_eq!(out.op_count, 11);
        // Repeatable against the same state
        assert_eq!(handle.run().unwrap(), out);

        handle.cleanup().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_sequential_read_pass() {
        let dir = tempfile::tempdir().unwrap();
        let workload = SequentialReadWorkload::new(WorkloadConfig::new(0.01));
        let mut handle = workload.setup(&small_target(&dir), 1024 * 1024).unwrap();

        let out = handle.run().unwrap();
        assert_eq!(out.bytes_processed, 2_684_355);
        assert!(out.op_count >= 3);

        handle.cleanup().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_setup_fails_on_missing_target() {
        let workload = SequentialWriteWorkload::new(WorkloadConfig::new(0.01));
        let target = Target::new("/nonexistent/oxdisk/target", "ext4");
        assert!(workload.setup(&target, 4096).is_err());
    }
}
