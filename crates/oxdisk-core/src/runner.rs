//! Pass runner: drives a workload through N timed passes and reduces them.

// Allow numeric casts - byte and op counts become f64 rates
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use crate::clock::Clock;
use crate::config::MetricKind;
use crate::error::{EngineError, Result};
use crate::job::BenchRequest;
use crate::platform::DeviceProbe;
use crate::registry::WorkloadRegistry;
use crate::result::BenchmarkResult;
use crate::stats::{clamp_pass_count, integer_mean, reduce, SampleSeries};
use crate::warmup::Warmup;
use crate::workload::Target;
use chrono::Utc;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const BYTES_PER_MB: f64 = 1_048_576.0;

/// Receives a human-readable line after every valid pass.
pub type ProgressFn<'a> = &'a dyn Fn(&str);

/// A reduced result plus the per-pass time series.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub result: BenchmarkResult,
    pub samples: SampleSeries,
}

/// Rates measured by one valid pass.
#[derive(Debug, Clone, Copy)]
struct PassRate {
    seconds: f64,
    bytes: u64,
    mb_per_sec: f64,
    iops: f64,
}

impl PassRate {
    fn value(&self, metric: MetricKind) -> f64 {
        match metric {
            MetricKind::Throughput => self.mb_per_sec,
            MetricKind::Iops => self.iops,
        }
    }
}

/// Runs benchmarks synchronously on the calling thread.
pub struct PassRunner {
    registry: Arc<WorkloadRegistry>,
    probe: Arc<dyn DeviceProbe>,
    clock: Arc<dyn Clock>,
    warmup: Warmup,
}

impl PassRunner {
    pub fn new(
        registry: Arc<WorkloadRegistry>,
        probe: Arc<dyn DeviceProbe>,
        clock: Arc<dyn Clock>,
        warmup: Warmup,
    ) -> Self {
        Self {
            registry,
            probe,
            clock,
            warmup,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn registry(&self) -> &WorkloadRegistry {
        &self.registry
    }

    /// Run one benchmark end to end.
    ///
    /// Setup happens once and cleanup exactly once, whatever the passes do.
    /// A pass that panics ends the run with [`EngineError::WorkloadPanicked`]
    /// after cleanup. Failed passes and passes that measured no time are excluded; if none
    /// remain the run fails with [`EngineError::NoValidPasses`].
    pub fn run(&self, request: &BenchRequest, progress: Option<ProgressFn<'_>>) -> Result<RunOutcome> {
        let path = request.target.as_path();
        let test_type = request.test_type;

        if request.flush_cache
            && let Err(e) = self.probe.flush_cache(path)
        {
            warn!(path = %path.display(), error = %e, "Cache flush failed, continuing");
        }

        let warmup = self.warmup.run(path);
        debug!(?warmup, "Warmup finished");

        let workload = self
            .registry
            .get(test_type)
            .ok_or(EngineError::UnknownWorkload(test_type))?;
        let defaults = workload.default_settings();
        let passes = clamp_pass_count(request.pass_count.unwrap_or(defaults.pass_count));
        let block_size = request.block_size.unwrap_or(defaults.block_size);
        let metric = test_type.metric();

        let mut result = BenchmarkResult::new(test_type, Utc::now());
        result.filesystem = self.probe.filesystem_name(path);
        result.volume = self.probe.volume_name(path);
        result.hardware = self.probe.hardware_info(path);
        result.pass_count = passes;
        result.block_size = block_size;
        result.trimmed = request.trimmed;

        info!(
            %test_type,
            passes,
            block_size,
            filesystem = %result.filesystem,
            "Starting benchmark"
        );

        let target = Target::new(path, result.filesystem.clone());
        let mut handle = workload
            .setup(&target, block_size)
            .map_err(|source| EngineError::Setup { test_type, source })?;

        let mut valid: Vec<PassRate> = Vec::with_capacity(passes as usize);
        let mut samples = SampleSeries::new();
        let mut elapsed = 0.0;

        let mut panicked = false;

        for pass in 1..=passes {
            let start = self.clock.now();
            let output = panic::catch_unwind(AssertUnwindSafe(|| handle.run()));
            let end = self.clock.now();

            let output = match output {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    warn!(pass, error = %e, "Pass failed, excluding it");
                    continue;
                }
                Err(_) => {
                    error!(pass, %test_type, "Workload panicked, abandoning remaining passes");
                    panicked = true;
                    break;
                }
            };
            let seconds = self.clock.elapsed_secs(start, end);
            if seconds <= 0.0 {
                debug!(pass, "Pass measured zero duration, excluding it");
                continue;
            }

            let rate = PassRate {
                seconds,
                bytes: output.bytes_processed,
                mb_per_sec: output.bytes_processed as f64 / BYTES_PER_MB / seconds,
                iops: output.op_count as f64 / seconds,
            };
            elapsed += seconds;
            samples.push(elapsed, rate.value(metric));
            valid.push(rate);

            debug!(pass, seconds, value = rate.value(metric), "Pass complete");
            if let Some(report) = progress {
                report(&format!(
                    "Pass {pass}/{passes}: {:.2} {}",
                    rate.value(metric),
                    metric.unit()
                ));
            }
        }

        if let Err(e) = handle.cleanup() {
            warn!(%test_type, error = %e, "Workload cleanup failed");
        }
        if panicked {
            return Err(EngineError::WorkloadPanicked(test_type));
        }

        let values: Vec<f64> = valid.iter().map(|r| r.value(metric)).collect();
        let reduction = reduce(&values, request.trimmed)
            .ok_or(EngineError::NoValidPasses { requested: passes })?;

        let iops: Vec<f64> = valid.iter().map(|r| r.iops).collect();
        result.iops = integer_mean(&iops);
        result.mb_per_sec = match metric {
            MetricKind::Throughput => reduction.mean,
            MetricKind::Iops => valid.iter().map(|r| r.mb_per_sec).sum::<f64>() / valid.len() as f64,
        };
        result.min_rate = reduction.min;
        result.max_rate = reduction.max;
        result.effective_passes = reduction.effective_passes as u32;
        result.total_duration = valid.iter().map(|r| r.seconds).sum();
        result.cumulative_bytes = valid.iter().map(|r| r.bytes).sum();

        info!(
            %test_type,
            value = result.headline(),
            unit = %result.unit,
            effective_passes = result.effective_passes,
            "Benchmark complete"
        );

        Ok(RunOutcome { result, samples })
    }
}
