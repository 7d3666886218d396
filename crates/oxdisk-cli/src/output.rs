//! Result tables and JSON export.

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use oxdisk_core::{BenchmarkResult, MetricKind, Sample, Status, Workload, WorkloadRegistry};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// JSON export document.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub metadata: ReportMetadata,
    pub results: Vec<ReportEntry<'a>>,
    pub failures: Vec<ReportFailure<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub platform: String,
    pub oxdisk_version: String,
}

#[derive(Debug, Serialize)]
pub struct ReportEntry<'a> {
    #[serde(flatten)]
    pub result: &'a BenchmarkResult,
    pub samples: &'a [Sample],
}

#[derive(Debug, Serialize)]
pub struct ReportFailure<'a> {
    pub test_type: String,
    pub error: &'a str,
}

impl<'a> Report<'a> {
    pub fn from_statuses(statuses: &'a [Status]) -> Self {
        let mut results = Vec::new();
        let mut failures = Vec::new();
        for status in statuses {
            match &status.result {
                Some(result) if status.success => results.push(ReportEntry {
                    result,
                    samples: &status.samples,
                }),
                _ => failures.push(ReportFailure {
                    test_type: status.test_type.name().to_string(),
                    error: &status.text,
                }),
            }
        }
        Self {
            metadata: ReportMetadata {
                timestamp: chrono::Utc::now().to_rfc3339(),
                platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
                oxdisk_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            results,
            failures,
        }
    }
}

/// Write finished statuses (results with their time series) to `path`.
pub fn export_json(statuses: &[Status], path: &Path) -> Result<()> {
    let report = Report::from_statuses(statuses);
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

fn number(value: String) -> Cell {
    Cell::new(value).set_alignment(CellAlignment::Right)
}

/// Summary table for one run's finished statuses.
pub fn results_table(statuses: &[Status], color: bool) -> Table {
    let mut table = new_table();
    table.set_header(header(&["Test", "Result", "Min", "Max", "IOPS", "Passes", "Block", "Time"]));

    for status in statuses {
        let name = Cell::new(status.test_type.name());
        let Some(result) = status.result.as_ref().filter(|_| status.success) else {
            let error = Cell::new(&status.text);
            let error = if color { error.fg(Color::Red) } else { error };
            table.add_row(vec![name, error]);
            continue;
        };

        let headline = Cell::new(format_rate(result.headline(), &result.unit))
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold);
        let headline = if color { headline.fg(Color::Green) } else { headline };
        table.add_row(vec![
            name,
            headline,
            number(format!("{:.2}", result.min_rate)),
            number(format!("{:.2}", result.max_rate)),
            number(result.iops.to_string()),
            number(passes_label(result)),
            number(format_bytes(u64::from(result.block_size))),
            number(format!("{:.2}s", result.total_duration)),
        ]);
    }
    table
}

/// Table of stored results, newest first.
pub fn history_table(results: &[BenchmarkResult]) -> Table {
    let mut table = new_table();
    table.set_header(header(&["When", "Test", "Result", "Passes", "Volume", "FS", "Device"]));
    for result in results {
        table.add_row(vec![
            Cell::new(result.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(result.test_type.name()),
            number(format_rate(result.headline(), &result.unit)),
            number(passes_label(result)),
            Cell::new(&result.volume),
            Cell::new(&result.filesystem),
            Cell::new(&result.hardware.product),
        ]);
    }
    table
}

/// Catalog of registered workloads with their default settings.
pub fn workloads_table(registry: &WorkloadRegistry) -> Table {
    let mut table = new_table();
    table.set_header(header(&["Test", "Name", "Unit", "Block", "Passes", "Description"]));
    for workload in registry.iter() {
        table.add_row(workload_row(workload));
    }
    table
}

fn workload_row(workload: &Arc<dyn Workload>) -> Vec<Cell> {
    let defaults = workload.default_settings();
    vec![
        Cell::new(workload.test_type().name()),
        Cell::new(workload.name()),
        Cell::new(workload.test_type().metric().unit()),
        number(format_bytes(u64::from(defaults.block_size))),
        number(defaults.pass_count.to_string()),
        Cell::new(workload.description()),
    ]
}

fn passes_label(result: &BenchmarkResult) -> String {
    if result.trimmed {
        format!("{}/{} (trimmed)", result.effective_passes, result.pass_count)
    } else {
        format!("{}/{}", result.effective_passes, result.pass_count)
    }
}

fn format_rate(value: f64, unit: &str) -> String {
    if unit == MetricKind::Iops.unit() {
        format!("{value:.0} {unit}")
    } else {
        format!("{value:.2} {unit}")
    }
}

/// Format a byte count with binary units.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB && bytes % GIB == 0 {
        format!("{} GiB", bytes / GIB)
    } else if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxdisk_core::{EngineError, TestType};

    fn completed(job_id: u64) -> Status {
        let mut result = BenchmarkResult::new(TestType::SequentialWrite, chrono::Utc::now());
        result.mb_per_sec = 512.25;
        result.pass_count = 3;
        result.effective_passes = 3;
        result.block_size = 1024 * 1024;
        Status {
            job_id,
            test_type: TestType::SequentialWrite,
            finished: true,
            success: true,
            result: Some(result),
            samples: vec![
                Sample { time_offset: 1.0, value: 500.0 },
                Sample { time_offset: 2.0, value: 524.5 },
            ],
            text: "seq-write: 512.25 MB/s over 3 passes".to_string(),
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(4096), "4 KiB");
        assert_eq!(format_bytes(1024 * 1024), "1 MiB");
        assert_eq!(format_bytes(1536), "1536 B");
    }

    #[test]
    fn test_export_json_splits_results_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let failed = Status::failed(2, TestType::Metadata, &EngineError::NoValidPasses { requested: 3 });

        export_json(&[completed(1), failed], &path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["results"].as_array().unwrap().len(), 1);
        assert_eq!(json["results"][0]["mb_per_sec"], 512.25);
        assert_eq!(json["results"][0]["samples"][1]["timeOffset"], 2.0);
        assert_eq!(json["failures"][0]["test_type"], "metadata");
        assert!(json["metadata"]["oxdisk_version"].is_string());
    }

    #[test]
    fn test_results_table_renders_failures() {
        let failed = Status::failed(2, TestType::Metadata, &EngineError::NoValidPasses { requested: 3 });
        let rendered = results_table(&[completed(1), failed], false).to_string();
        assert!(rendered.contains("512.25 MB/s"));
        assert!(rendered.contains("3/3"));
        assert!(rendered.contains("no valid passes"));
    }
}
