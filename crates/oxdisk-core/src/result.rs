//! Benchmark result record and time-series samples.

use crate::config::{MetricKind, TestType};
use crate::platform::HardwareInfo;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Version stamped into every result.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One point of a result's time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Cumulative measured seconds at the end of the pass.
    pub time_offset: f64,
    /// Pass rate, in the result's unit.
    pub value: f64,
}

/// Aggregated outcome of one benchmark request.
///
/// Identity and environment fields are filled before the first pass runs;
/// the measurements are filled once the passes have been reduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub result_id: String,
    pub timestamp: DateTime<Utc>,
    pub test_type: TestType,
    pub volume: String,
    pub filesystem: String,

    /// Aggregate MiB/s.
    pub mb_per_sec: f64,
    /// Integer mean of per-pass IOPS over valid passes.
    pub iops: u64,
    /// Unit of `min_rate`/`max_rate` and of the samples ("MB/s" or "IOPS").
    pub unit: String,
    pub min_rate: f64,
    pub max_rate: f64,

    /// Requested passes after clamping.
    pub pass_count: u32,
    /// Passes that contributed to the aggregate.
    pub effective_passes: u32,
    pub block_size: u32,
    pub trimmed: bool,

    /// Sum of valid pass durations, in seconds.
    pub total_duration: f64,
    /// Sum of bytes moved by valid passes.
    pub cumulative_bytes: u64,

    pub app_version: String,
    #[serde(flatten)]
    pub hardware: HardwareInfo,
}

impl BenchmarkResult {
    /// Result with identity fields set and measurements zeroed.
    pub fn new(test_type: TestType, timestamp: DateTime<Utc>) -> Self {
        Self {
            result_id: generate_result_id(timestamp),
            timestamp,
            test_type,
            volume: String::new(),
            filesystem: String::new(),
            mb_per_sec: 0.0,
            iops: 0,
            unit: test_type.metric().unit().to_string(),
            min_rate: 0.0,
            max_rate: 0.0,
            pass_count: 0,
            effective_passes: 0,
            block_size: 0,
            trimmed: false,
            total_duration: 0.0,
            cumulative_bytes: 0,
            app_version: APP_VERSION.to_string(),
            hardware: HardwareInfo::default(),
        }
    }

    /// The headline number in the result's own unit.
    pub fn headline(&self) -> f64 {
        match self.test_type.metric() {
            MetricKind::Throughput => self.mb_per_sec,
            MetricKind::Iops => self.iops as f64,
        }
    }
}

/// Result ID: UTC timestamp plus a short random hex suffix.
pub fn generate_result_id(timestamp: DateTime<Utc>) -> String {
    let suffix: u16 = rand::rng().random();
    format!("{}-{suffix:04x}", timestamp.format("%Y%m%dT%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_result_id_shape() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap();
        let id = generate_result_id(ts);
        assert!(id.starts_with("20250314T150926-"));
        assert_eq!(id.len(), "20250314T150926-".len() + 4);
        assert!(id[16..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sample_field_names() {
        let json = serde_json::to_string(&Sample {
            time_offset: 1.5,
            value: 200.0,
        })
        .unwrap();
        assert_eq!(json, r#"{"timeOffset":1.5,"value":200.0}"#);
    }

    #[test]
    fn test_result_json_round_trip() {
        let mut result = BenchmarkResult::new(TestType::Metadata, Utc::now());
        result.iops = 4200;
        result.hardware.vendor = "ACME".to_string();
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""vendor":"ACME""#));
        let back: BenchmarkResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.unit, "IOPS");
        assert!((back.headline() - 4200.0).abs() < f64::EPSILON);
    }
}
