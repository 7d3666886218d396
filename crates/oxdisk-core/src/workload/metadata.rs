//! Small-file metadata workload, reported in operations per second.

use super::{
    create_scratch_dir, random_buffer, remove_scratch_dir, validate_block_size, PassOutput,
    Target, Workload, WorkloadHandle,
};
use crate::config::{DefaultSettings, TestType, WorkloadConfig};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

const BASE_FILES: usize = 2000;
const MIN_FILES: usize = 20;

/// Create + write, stat, delete.
const OPS_PER_FILE: u64 = 3;

/// Creates, stats and deletes many small files per pass.
pub struct MetadataWorkload {
    config: WorkloadConfig,
}

impl MetadataWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }
}

struct MetadataHandle {
    dir: PathBuf,
    files: Vec<PathBuf>,
    content: Vec<u8>,
}

impl Workload for MetadataWorkload {
    fn test_type(&self) -> TestType {
        TestType::Metadata
    }

    fn name(&self) -> &'static str {
        "Metadata"
    }

    fn description(&self) -> &'static str {
        "Creates, writes, stats and deletes many small files"
    }

    fn default_settings(&self) -> DefaultSettings {
        DefaultSettings {
            block_size: 4096,
            pass_count: 3,
        }
    }

    fn setup(&self, target: &Target, block_size: u32) -> Result<Box<dyn WorkloadHandle>> {
        let block = validate_block_size(block_size)?;
        let mut count = self.config.scale_count(BASE_FILES, MIN_FILES);
        if target.is_ram_backed() {
            count = (count / 2).max(MIN_FILES);
        }
        let content = random_buffer(block, 11)?;
        let dir = create_scratch_dir(&target.path, "meta")
            .with_context(|| format!("Failed to create scratch dir in {}", target.path.display()))?;
        let files = (0..count).map(|i| dir.join(format!("f_{i:05}.dat"))).collect();

        Ok(Box::new(MetadataHandle {
            dir,
            files,
            content,
        }))
    }
}

impl WorkloadHandle for MetadataHandle {
    fn run(&mut self) -> Result<PassOutput> {
        for path in &self.files {
            let mut file = File::create(path)?;
            file.write_all(&self.content)?;
        }
        for path in &self.files {
            let meta = fs::metadata(path)?;
            std::hint::black_box(meta.len());
        }
        for path in &self.files {
            fs::remove_file(path)?;
        }

        let files = self.files.len() as u64;
        Ok(PassOutput {
            bytes_processed: files * self.content.len() as u64,
            op_count: files * OPS_PER_FILE,
        })
    }

    fn cleanup(self: Box<Self>) -> Result<()> {
        remove_scratch_dir(&self.dir)
            .with_context(|| format!("Failed to remove {}", self.dir.display()))
    }
}
