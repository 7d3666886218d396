//! Directory churn: build, rename and tear down small file trees.

use super::{
    create_scratch_dir, remove_scratch_dir, validate_block_size, PassOutput, Target, Workload,
    WorkloadHandle,
};
use crate::config::{DefaultSettings, TestType, WorkloadConfig};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

const BASE_DIRS: usize = 50;
const MIN_DIRS: usize = 5;
const BASE_FILES_PER_DIR: usize = 20;
const MIN_FILES_PER_DIR: usize = 4;

/// Bytes written into each churned file (capped by the block size).
const MAX_FILE_BYTES: usize = 1024;

pub struct DirectoryChurnWorkload {
    config: WorkloadConfig,
}

impl DirectoryChurnWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }
}

struct ChurnHandle {
    root: PathBuf,
    dirs: usize,
    files_per_dir: usize,
    content: Vec<u8>,
    pass: u64,
}

impl Workload for DirectoryChurnWorkload {
    fn test_type(&self) -> TestType {
        TestType::DirectoryChurn
    }

    fn name(&self) -> &'static str {
        "Directory Churn"
    }

    fn description(&self) -> &'static str {
        "Creates directories of small files, renames every file, then removes the tree"
    }

    fn default_settings(&self) -> DefaultSettings {
        DefaultSettings {
            block_size: 4096,
            pass_count: 3,
        }
    }

    fn setup(&self, target: &Target, block_size: u32) -> Result<Box<dyn WorkloadHandle>> {
        let block = validate_block_size(block_size)?;
        let root = create_scratch_dir(&target.path, "churn")
            .with_context(|| format!("Failed to create scratch dir in {}", target.path.display()))?;

        Ok(Box::new(ChurnHandle {
            root,
            dirs: self.config.scale_count(BASE_DIRS, MIN_DIRS),
            files_per_dir: self.config.scale_count(BASE_FILES_PER_DIR, MIN_FILES_PER_DIR),
            content: vec![0x5A; block.min(MAX_FILE_BYTES)],
            pass: 0,
        }))
    }
}

impl WorkloadHandle for ChurnHandle {
    fn run(&mut self) -> Result<PassOutput> {
        let pass_dir = self.root.join(format!("pass_{}", self.pass));
        self.pass += 1;

        let mut ops = 0u64;
        let mut bytes = 0u64;

        fs::create_dir(&pass_dir)?;
        ops += 1;

        for d in 0..self.dirs {
            let dir = pass_dir.join(format!("d_{d:03}"));
            fs::create_dir(&dir)?;
            ops += 1;

            for f in 0..self.files_per_dir {
                let from = dir.join(format!("new_{f:03}"));
                let mut file = File::create(&from)?;
                file.write_all(&self.content)?;
                bytes += self.content.len() as u64;

                let to = dir.join(format!("renamed_{f:03}"));
                fs::rename(&from, &to)?;
                fs::remove_file(&to)?;
                ops += 3;
            }

            fs::remove_dir(&dir)?;
            ops += 1;
        }

        fs::remove_dir(&pass_dir)?;
        ops += 1;

        Ok(PassOutput {
            bytes_processed: bytes,
            op_count: ops,
        })
    }

    fn cleanup(self: Box<Self>) -> Result<()> {
        remove_scratch_dir(&self.root)
            .with_context(|| format!("Failed to remove {}", self.root.display()))
    }
}
