//! Storage benchmark engine.
//!
//! Workloads generate one I/O pattern each; the [`PassRunner`] times N
//! passes of a workload and reduces them to a [`BenchmarkResult`]; the
//! [`Engine`] queues requests in front of a single worker thread so at most
//! one benchmark touches a device at a time.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod job;
pub mod platform;
pub mod queue;
pub mod registry;
pub mod result;
pub mod runner;
pub mod stats;
pub mod warmup;
pub mod worker;
pub mod workload;

#[cfg(test)]
mod testing;

pub use config::{EngineConfig, MetricKind, TestType, WarmupConfig, WorkloadConfig};
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, Result};
pub use history::{HistoryStore, JsonlHistoryStore, NullHistory};
pub use job::{BenchRequest, JobId, Status, WorkerEvent};
pub use queue::EnqueueOutcome;
pub use registry::WorkloadRegistry;
pub use result::{BenchmarkResult, Sample};
pub use runner::{PassRunner, RunOutcome};
pub use workload::{PassOutput, Target, Workload, WorkloadHandle};
