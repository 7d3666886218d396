//! Random-offset block workloads: pure reads, pure writes and a 70/30 mix.

// Allow numeric casts between file offsets (u64) and buffer lengths (usize)
#![allow(clippy::cast_possible_truncation)]

use super::{
    create_scratch_dir, fill_file, random_buffer, remove_scratch_dir, sync_file,
    validate_block_size, PassOutput, Target, Workload, WorkloadHandle,
};
use crate::config::{DefaultSettings, TestType, WorkloadConfig};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

const BASE_FILE_BYTES: u64 = 64 * 1024 * 1024;
const MIN_FILE_BYTES: u64 = 4 * 1024 * 1024;
const BASE_OPS: usize = 8192;
const MIN_OPS: usize = 128;

/// Share of operations that are reads in the mixed workload.
const MIXED_READ_RATIO: f64 = 0.70;

const DEFAULTS: DefaultSettings = DefaultSettings {
    block_size: 4096,
    pass_count: 5,
};

/// Direction of a random-access workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomMode {
    Read,
    Write,
}

/// Reads or writes block-sized chunks at random aligned offsets of a prepared file.
pub struct RandomAccessWorkload {
    mode: RandomMode,
    config: WorkloadConfig,
}

impl RandomAccessWorkload {
    pub fn read(config: WorkloadConfig) -> Self {
        Self {
            mode: RandomMode::Read,
            config,
        }
    }

    pub fn write(config: WorkloadConfig) -> Self {
        Self {
            mode: RandomMode::Write,
            config,
        }
    }
}

impl Workload for RandomAccessWorkload {
    fn test_type(&self) -> TestType {
        match self.mode {
            RandomMode::Read => TestType::RandomRead4K,
            RandomMode::Write => TestType::RandomWrite4K,
        }
    }

    fn name(&self) -> &'static str {
        match self.mode {
            RandomMode::Read => "Random Read 4K",
            RandomMode::Write => "Random Write 4K",
        }
    }

    fn description(&self) -> &'static str {
        match self.mode {
            RandomMode::Read => "Reads blocks at random aligned offsets of a prepared file",
            RandomMode::Write => "Writes blocks at random aligned offsets of a prepared file, then fsyncs",
        }
    }

    fn default_settings(&self) -> DefaultSettings {
        DEFAULTS
    }

    fn setup(&self, target: &Target, block_size: u32) -> Result<Box<dyn WorkloadHandle>> {
        let read_ratio = match self.mode {
            RandomMode::Read => 1.0,
            RandomMode::Write => 0.0,
        };
        RandomHandle::prepare(&self.config, target, block_size, read_ratio, "rand")
    }
}

/// Random 4K traffic with 70 % reads and 30 % writes.
pub struct MixedRandomWorkload {
    config: WorkloadConfig,
}

impl MixedRandomWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }
}

impl Workload for MixedRandomWorkload {
    fn test_type(&self) -> TestType {
        TestType::MixedRandom
    }

    fn name(&self) -> &'static str {
        "Mixed Random 70/30"
    }

    fn description(&self) -> &'static str {
        "70% reads / 30% writes at random aligned offsets of a prepared file"
    }

    fn default_settings(&self) -> DefaultSettings {
        DEFAULTS
    }

    fn setup(&self, target: &Target, block_size: u32) -> Result<Box<dyn WorkloadHandle>> {
        RandomHandle::prepare(&self.config, target, block_size, MIXED_READ_RATIO, "mixed")
    }
}

struct RandomHandle {
    dir: PathBuf,
    file: File,
    buffer: Vec<u8>,
    slots: u64,
    ops_per_pass: usize,
    read_ratio: f64,
    rng: ChaCha8Rng,
}

impl RandomHandle {
    fn prepare(
        config: &WorkloadConfig,
        target: &Target,
        block_size: u32,
        read_ratio: f64,
        prefix: &str,
    ) -> Result<Box<dyn WorkloadHandle>> {
        let block = validate_block_size(block_size)?;
        let requested = target.data_set_bytes(
            config.scale_bytes(BASE_FILE_BYTES, MIN_FILE_BYTES),
            MIN_FILE_BYTES,
        );
        let slots = (requested / block as u64).max(1);
        let file_bytes = slots * block as u64;
        let ops_per_pass = config.scale_count(BASE_OPS, MIN_OPS);

        let buffer = random_buffer(block, 7)?;
        let dir = create_scratch_dir(&target.path, prefix)
            .with_context(|| format!("Failed to create scratch dir in {}", target.path.display()))?;
        let path = dir.join("random.bin");

        let opened = fill_file(&path, &buffer, file_bytes).and_then(|()| {
            OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(anyhow::Error::from)
        });
        let file = match opened {
            Ok(file) => file,
            Err(e) => {
                let _ = remove_scratch_dir(&dir);
                return Err(e.context("Failed to prepare random access file"));
            }
        };

        Ok(Box::new(Self {
            dir,
            file,
            buffer,
            slots,
            ops_per_pass,
            read_ratio,
            rng: ChaCha8Rng::seed_from_u64(0x4B_5EED),
        }))
    }
}

impl WorkloadHandle for RandomHandle {
    fn run(&mut self) -> Result<PassOutput> {
        let block = self.buffer.len() as u64;
        let mut wrote = false;

        for _ in 0..self.ops_per_pass {
            let offset = self.rng.random_range(0..self.slots) * block;
            self.file.seek(SeekFrom::Start(offset))?;
            if self.rng.random::<f64>() < self.read_ratio {
                self.file.read_exact(&mut self.buffer)?;
                std::hint::black_box(&self.buffer);
            } else {
                self.file.write_all(&self.buffer)?;
                wrote = true;
            }
        }
        if wrote {
            sync_file(&self.file)?;
        }

        let ops = self.ops_per_pass as u64;
        Ok(PassOutput {
            bytes_processed: ops * block,
            op_count: ops,
        })
    }

    fn cleanup(self: Box<Self>) -> Result<()> {
        let Self { dir, file, .. } = *self;
        drop(file);
        remove_scratch_dir(&dir).with_context(|| format!("Failed to remove {}", dir.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_once(workload: &dyn Workload) -> PassOutput {
        let dir = tempfile::tempdir().unwrap();
        let target = Target::new(dir.path(), "ext4");
        let mut handle = workload.setup(&target, 4096).unwrap();
        let out = handle.run().unwrap();
        handle.run().unwrap();
        handle.cleanup().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        out
    }

    #[test]
    fn test_random_read_pass() {
        let out = run_once(&RandomAccessWorkload::read(WorkloadConfig::new(0.01)));
        assert_eq!(out.op_count, 128);
        assert_eq!(out.bytes_processed, 128 * 4096);
    }

    #[test]
    fn test_random_write_pass() {
        let workload = RandomAccessWorkload::write(WorkloadConfig::new(0.01));
        assert_eq!(workload.test_type(), TestType::RandomWrite4K);
        let out = run_once(&workload);
        assert_eq!(out.bytes_processed, 128 * 4096);
    }

    #[test]
    fn test_mixed_pass() {
        let out = run_once(&MixedRandomWorkload::new(WorkloadConfig::new(0.01)));
        assert_eq!(out.op_count, 128);
    }

    #[test]
    fn test_block_larger_than_data_set() {
        let dir = tempfile::tempdir().unwrap();
        let target = Target::new(dir.path(), "ext4");
        let workload = RandomAccessWorkload::read(WorkloadConfig::new(0.01));
        let mut handle = workload.setup(&target, 8 * 1024 * 1024).unwrap();
        let out = handle.run().unwrap();
        assert_eq!(out.bytes_processed, 128 * 8 * 1024 * 1024);
        handle.cleanup().unwrap();
    }
}
