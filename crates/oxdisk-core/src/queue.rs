//! FIFO of pending jobs in front of the single worker.
//!
//! The queue lives on the caller's side. It hands at most one job to the
//! worker inbox at a time and releases the next one only when the caller
//! reports the in-flight job as released.

use crate::error::{EngineError, Result};
use crate::job::{Envelope, Job, JobId};
use crossbeam_channel::Sender;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// What [`JobQueue::enqueue`] did with a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Queued and immediately handed to the idle worker.
    Dispatched,
    /// Queued behind the in-flight job.
    Queued,
    /// No queue node could be allocated; sent straight to the idle worker.
    DispatchedDirect,
    /// No queue node could be allocated and the worker was busy; the job was dropped.
    Dropped,
}

pub struct JobQueue {
    pending: VecDeque<Job>,
    in_flight: Option<JobId>,
    node_limit: Option<usize>,
    inbox: Sender<Envelope>,
}

impl JobQueue {
    /// Queue feeding `inbox`. `node_limit` simulates allocation failure once
    /// that many jobs are waiting.
    pub fn new(inbox: Sender<Envelope>, node_limit: Option<usize>) -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: None,
            node_limit,
            inbox,
        }
    }

    /// Add a job to the tail, dispatching it at once if the worker is idle.
    ///
    /// Never blocks. When no node can be allocated the job is sent directly
    /// if the worker is idle, and dropped otherwise.
    pub fn enqueue(&mut self, job: Job) -> Result<EnqueueOutcome> {
        if let Err(e) = self.allocate_node() {
            let id = job.id;
            if self.is_busy() {
                warn!(job_id = id, error = %e, "Dropping job");
                drop(job);
                return Ok(EnqueueOutcome::Dropped);
            }
            warn!(job_id = id, error = %e, "Sending job directly to idle worker");
            self.hand_off(job)?;
            return Ok(EnqueueOutcome::DispatchedDirect);
        }

        trace!(job_id = job.id, depth = self.pending.len(), "Job queued");
        self.pending.push_back(job);
        if self.is_busy() {
            Ok(EnqueueOutcome::Queued)
        } else {
            self.dispatch_next()?;
            Ok(EnqueueOutcome::Dispatched)
        }
    }

    /// Hand the head job to the worker, or mark the worker idle if none is waiting.
    ///
    /// Returns the dispatched job's id.
    pub fn dispatch_next(&mut self) -> Result<Option<JobId>> {
        let Some(job) = self.pending.pop_front() else {
            self.in_flight = None;
            return Ok(None);
        };
        let id = job.id;
        self.hand_off(job)?;
        Ok(Some(id))
    }

    /// Caller-side notice that the worker released `job_id`; dispatches the next job.
    ///
    /// Releases for anything but the in-flight job are ignored.
    pub fn release(&mut self, job_id: JobId) -> Result<Option<JobId>> {
        if self.in_flight != Some(job_id) {
            debug!(job_id, in_flight = ?self.in_flight, "Ignoring release of job not in flight");
            return Ok(None);
        }
        self.dispatch_next()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Jobs waiting behind the in-flight one.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<JobId> {
        self.in_flight
    }

    /// Drop every waiting job. The in-flight job is unaffected.
    pub fn cleanup(&mut self) -> usize {
        let drained = self.pending.len();
        self.pending.clear();
        if drained > 0 {
            debug!(drained, "Discarded queued jobs");
        }
        drained
    }

    fn allocate_node(&mut self) -> Result<()> {
        if self.node_limit.is_some_and(|limit| self.pending.len() >= limit) {
            return Err(EngineError::QueueAllocation);
        }
        self.pending
            .try_reserve(1)
            .map_err(|_| EngineError::QueueAllocation)
    }

    /// The only place the worker becomes busy.
    fn hand_off(&mut self, job: Job) -> Result<()> {
        let id = job.id;
        self.in_flight = Some(id);
        if self.inbox.send(Envelope::Run(job)).is_err() {
            self.in_flight = None;
            return Err(EngineError::WorkerGone);
        }
        trace!(job_id = id, "Job dispatched");
        Ok(())
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("pending", &self.pending.iter().map(|j| j.id).collect::<Vec<_>>())
            .field("in_flight", &self.in_flight)
            .field("node_limit", &self.node_limit)
            .finish_non_exhaustive()
    }
}
