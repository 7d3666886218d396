//! Configuration types for the benchmark engine.

// Allow numeric casts in workload size scaling
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard upper bound on passes per benchmark.
pub const MAX_PASSES: u32 = 20;

/// Maximum number of time-series samples kept per result.
pub const MAX_SAMPLES: usize = 1024;

/// Maximum length of a job's target path, in bytes.
pub const MAX_TARGET_PATH_BYTES: usize = 256;

/// Maximum length of a status message, in bytes.
pub const MAX_STATUS_TEXT_BYTES: usize = 128;

/// Unit a workload's per-pass rate is reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// MiB per second (bytes / 1,048,576 / seconds).
    Throughput,
    /// Operations per second.
    Iops,
}

impl MetricKind {
    /// Unit label used in status text and result records.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Throughput => "MB/s",
            Self::Iops => "IOPS",
        }
    }
}

/// Benchmark test type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestType {
    /// Fixed-size sequential write.
    SequentialWrite,
    /// Sequential read of a prepared file.
    SequentialRead,
    /// Random-offset block writes.
    RandomWrite4K,
    /// Random-offset block reads.
    RandomRead4K,
    /// 70/30 random read/write mix.
    MixedRandom,
    /// Small-file create/stat/delete.
    Metadata,
    /// Directory tree create/rename/remove.
    DirectoryChurn,
}

/// Canonical names and aliases accepted on the command line.
pub const TEST_TYPE_NAMES: &[(TestType, &str, &[&str])] = &[
    (TestType::SequentialWrite, "seq-write", &["sequential-write", "seqwrite"]),
    (TestType::SequentialRead, "seq-read", &["sequential-read", "seqread"]),
    (TestType::RandomWrite4K, "rand-write", &["random-write", "4k-write", "randwrite"]),
    (TestType::RandomRead4K, "rand-read", &["random-read", "4k-read", "randread"]),
    (TestType::MixedRandom, "mixed", &["mixed-rw", "70-30"]),
    (TestType::Metadata, "metadata", &["meta", "profiler"]),
    (TestType::DirectoryChurn, "churn", &["directory-churn", "dirchurn"]),
];

impl TestType {
    /// All test types, in catalog order.
    pub fn all() -> Vec<Self> {
        TEST_TYPE_NAMES.iter().map(|(t, _, _)| *t).collect()
    }

    /// Canonical command-line name.
    pub fn name(&self) -> &'static str {
        TEST_TYPE_NAMES
            .iter()
            .find(|(t, _, _)| t == self)
            .map_or("unknown", |(_, name, _)| name)
    }

    /// Unit the per-pass rate is measured in.
    pub fn metric(&self) -> MetricKind {
        match self {
            Self::Metadata | Self::DirectoryChurn => MetricKind::Iops,
            _ => MetricKind::Throughput,
        }
    }
}

impl std::fmt::Display for TestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        for (test_type, canonical, aliases) in TEST_TYPE_NAMES {
            if *canonical == lower || aliases.contains(&lower.as_str()) {
                return Ok(*test_type);
            }
        }
        let valid = TEST_TYPE_NAMES
            .iter()
            .map(|(_, name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        Err(format!("Unknown test: {s}. Valid options: {valid}"))
    }
}

/// Block size and pass count a workload suggests when the caller does not override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultSettings {
    pub block_size: u32,
    pub pass_count: u32,
}

/// Scaling of workload data-set sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkloadConfig {
    /// Scale factor for counts and sizes (0.01-1.0).
    pub scale: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl WorkloadConfig {
    pub fn new(scale: f64) -> Self {
        Self {
            scale: scale.clamp(0.01, 1.0),
        }
    }

    /// Scale a count value, respecting minimum bounds.
    pub fn scale_count(&self, base: usize, min: usize) -> usize {
        let scaled = (base as f64 * self.scale).round() as usize;
        scaled.clamp(min, base.max(min))
    }

    /// Scale a byte size value, respecting minimum bounds.
    pub fn scale_bytes(&self, base: u64, min: u64) -> u64 {
        let scaled = (base as f64 * self.scale).round() as u64;
        scaled.clamp(min, base.max(min))
    }
}

/// Warmup settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmupConfig {
    pub enabled: bool,
    /// Bytes written and read back per warmup.
    pub size_bytes: usize,
    /// A warmup against the same target within this window is skipped.
    pub throttle: Duration,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size_bytes: 8 * 1024 * 1024,
            throttle: Duration::from_secs(5),
        }
    }
}

/// Engine-wide configuration, built once by the caller.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub warmup: WarmupConfig,
    pub workload: WorkloadConfig,
    /// Simulated allocation limit for queue nodes. `None` means memory-bound only.
    pub queue_node_limit: Option<usize>,
    /// Simulated allocation limit for a status's sample buffer. `None` means memory-bound only.
    pub status_sample_limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_and_alias() {
        assert_eq!("seq-write".parse::<TestType>().unwrap(), TestType::SequentialWrite);
        assert_eq!("RANDOM-READ".parse::<TestType>().unwrap(), TestType::RandomRead4K);
        assert_eq!("profiler".parse::<TestType>().unwrap(), TestType::Metadata);
        assert!("defrag".parse::<TestType>().is_err());
    }

    #[test]
    fn test_names_round_trip() {
        for t in TestType::all() {
            assert_eq!(t.name().parse::<TestType>().unwrap(), t);
        }
    }

    #[test]
    fn test_metric_kind() {
        assert_eq!(TestType::Metadata.metric(), MetricKind::Iops);
        assert_eq!(TestType::DirectoryChurn.metric().unit(), "IOPS");
        assert_eq!(TestType::MixedRandom.metric().unit(), "MB/s");
    }

    #[test]
    fn test_workload_scale_bounds() {
        let config = WorkloadConfig::new(0.0);
        assert!((config.scale - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.scale_count(1000, 20), 20);
        assert_eq!(config.scale_bytes(1 << 30, 1 << 20), 10_737_418);
        assert_eq!(WorkloadConfig::new(2.0).scale_count(1000, 20), 1000);
    }
}
