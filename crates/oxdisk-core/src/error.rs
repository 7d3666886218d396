//! Error types for the benchmark engine.
//!
//! Workload internals report through `anyhow`; everything that crosses the
//! engine boundary is an [`EngineError`]. A single failed pass is never an
//! error: it is excluded from the statistics and logged.

use crate::config::TestType;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No workload is registered for the requested test type.
    #[error("no workload registered for test type {0}")]
    UnknownWorkload(TestType),

    /// Workload setup failed; no passes were run.
    #[error("setup failed for {test_type}: {source:#}")]
    Setup {
        test_type: TestType,
        #[source]
        source: anyhow::Error,
    },

    /// Every pass failed or reported zero duration.
    #[error("no valid passes out of {requested} requested")]
    NoValidPasses { requested: u32 },

    /// A queue node could not be allocated.
    #[error("job queue allocation failed")]
    QueueAllocation,

    /// A workload panicked; the worker survived and moved on.
    #[error("workload {0} panicked")]
    WorkloadPanicked(TestType),

    /// A status message could not be allocated.
    #[error("status reply allocation failed")]
    ReplyAllocation,

    /// The benchmark request is malformed.
    #[error("invalid benchmark request: {0}")]
    InvalidRequest(String),

    /// The high-resolution clock is unusable.
    #[error("high-resolution clock unavailable")]
    ClockUnavailable,

    /// The worker thread could not be started.
    #[error("failed to spawn benchmark worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The worker inbox is disconnected.
    #[error("benchmark worker is not running")]
    WorkerGone,

    /// Persisting or loading history failed.
    #[error("history store error: {0:#}")]
    History(#[source] anyhow::Error),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
