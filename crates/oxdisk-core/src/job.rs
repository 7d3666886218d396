//! Messages exchanged between the caller, the job queue and the worker.

use crate::config::{TestType, MAX_STATUS_TEXT_BYTES, MAX_TARGET_PATH_BYTES};
use crate::error::{EngineError, Result};
use crate::result::{BenchmarkResult, Sample};
use crate::runner::RunOutcome;
use crossbeam_channel::Sender;
use std::path::PathBuf;

pub type JobId = u64;

/// Parameters of one benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchRequest {
    pub test_type: TestType,
    pub target: PathBuf,
    /// Passes to run; the workload's default when `None`. Clamped to `1..=MAX_PASSES`.
    pub pass_count: Option<u32>,
    /// Block size in bytes; the workload's default when `None`.
    pub block_size: Option<u32>,
    pub trimmed: bool,
    pub flush_cache: bool,
}

impl BenchRequest {
    pub fn new(test_type: TestType, target: impl Into<PathBuf>) -> Self {
        Self {
            test_type,
            target: target.into(),
            pass_count: None,
            block_size: None,
            trimmed: false,
            flush_cache: false,
        }
    }

    #[must_use]
    pub fn with_passes(mut self, passes: u32) -> Self {
        self.pass_count = Some(passes);
        self
    }

    #[must_use]
    pub fn with_block_size(mut self, bytes: u32) -> Self {
        self.block_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_trimmed(mut self, trimmed: bool) -> Self {
        self.trimmed = trimmed;
        self
    }

    #[must_use]
    pub fn with_flush_cache(mut self, flush: bool) -> Self {
        self.flush_cache = flush;
        self
    }

    /// Reject requests the worker could never run.
    pub fn validate(&self) -> Result<()> {
        let len = self.target.as_os_str().len();
        if len > MAX_TARGET_PATH_BYTES {
            return Err(EngineError::InvalidRequest(format!(
                "target path is {len} bytes, limit is {MAX_TARGET_PATH_BYTES}"
            )));
        }
        if !self.target.is_dir() {
            return Err(EngineError::InvalidRequest(format!(
                "target {} is not a directory",
                self.target.display()
            )));
        }
        if self.block_size == Some(0) {
            return Err(EngineError::InvalidRequest("block size must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// A queued benchmark request and the channel its replies go to.
///
/// Dropping a job drops its reply sender, which the caller observes as a
/// disconnected reply stream.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub request: BenchRequest,
    pub reply: Sender<WorkerEvent>,
}

impl Job {
    pub fn new(id: JobId, request: BenchRequest, reply: Sender<WorkerEvent>) -> Self {
        Self { id, request, reply }
    }
}

/// Progress or completion report for a job.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub job_id: JobId,
    pub test_type: TestType,
    /// `true` only on the terminal status.
    pub finished: bool,
    pub success: bool,
    pub result: Option<BenchmarkResult>,
    pub samples: Vec<Sample>,
    /// Short human-readable text, at most `MAX_STATUS_TEXT_BYTES` bytes.
    pub text: String,
}

impl Status {
    pub fn progress(job_id: JobId, test_type: TestType, text: &str) -> Self {
        Self {
            job_id,
            test_type,
            finished: false,
            success: false,
            result: None,
            samples: Vec::new(),
            text: truncate_status_text(text),
        }
    }

    /// Terminal status for a successful run.
    ///
    /// The sample buffer is allocated fallibly; `sample_limit` simulates an
    /// allocator that refuses buffers above that many samples.
    pub fn completed(job_id: JobId, outcome: RunOutcome, sample_limit: Option<usize>) -> Result<Self> {
        let RunOutcome { result, samples } = outcome;
        if sample_limit.is_some_and(|limit| samples.len() > limit) {
            return Err(EngineError::ReplyAllocation);
        }
        let mut owned = Vec::new();
        owned
            .try_reserve_exact(samples.len())
            .map_err(|_| EngineError::ReplyAllocation)?;
        owned.extend_from_slice(samples.as_slice());

        let text = format!(
            "{}: {:.2} {} over {} passes",
            result.test_type,
            result.headline(),
            result.unit,
            result.effective_passes
        );
        Ok(Self {
            job_id,
            test_type: result.test_type,
            finished: true,
            success: true,
            result: Some(result),
            samples: owned,
            text: truncate_status_text(&text),
        })
    }

    /// Terminal status for a failed run.
    pub fn failed(job_id: JobId, test_type: TestType, error: &EngineError) -> Self {
        Self {
            job_id,
            test_type,
            finished: true,
            success: false,
            result: None,
            samples: Vec::new(),
            text: truncate_status_text(&error.to_string()),
        }
    }
}

/// Event sent from the worker to a job's reply channel.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Status(Status),
    /// The worker is done with this job; always sent last, even when no
    /// terminal status could be built.
    Released { job_id: JobId },
}

/// Message in the worker's inbox.
#[derive(Debug)]
pub enum Envelope {
    Run(Job),
    /// Stop after the current job; `ack` is signalled before the worker exits.
    Quit { ack: Sender<()> },
}

/// Cut `text` to at most `MAX_STATUS_TEXT_BYTES` bytes on a char boundary.
pub fn truncate_status_text(text: &str) -> String {
    if text.len() <= MAX_STATUS_TEXT_BYTES {
        return text.to_string();
    }
    let mut end = MAX_STATUS_TEXT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
