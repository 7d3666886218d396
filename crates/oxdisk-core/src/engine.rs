//! Caller-side facade: owns the registry, the job queue, the worker and the
//! reply channel every job reports to.

use crate::clock::{Clock, QuantaClock};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::history::{HistoryStore, NullHistory};
use crate::job::{BenchRequest, Job, JobId, Status, WorkerEvent};
use crate::platform::{DeviceProbe, SystemProbe};
use crate::queue::{EnqueueOutcome, JobQueue};
use crate::registry::WorkloadRegistry;
use crate::runner::PassRunner;
use crate::warmup::Warmup;
use crate::worker::{Worker, WorkerHandle};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How often a blocked caller checks that the worker is still alive.
const LIVENESS_POLL: Duration = Duration::from_millis(200);

/// Builds an [`Engine`], defaulting every collaborator to the real system.
pub struct EngineBuilder {
    config: EngineConfig,
    registry: Option<WorkloadRegistry>,
    probe: Option<Arc<dyn DeviceProbe>>,
    clock: Option<Arc<dyn Clock>>,
    history: Option<Arc<dyn HistoryStore>>,
}

impl EngineBuilder {
    #[must_use]
    pub fn registry(mut self, registry: WorkloadRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn DeviceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Spawn the worker and return a ready engine.
    pub fn start(self) -> Result<Engine> {
        let Self {
            config,
            registry,
            probe,
            clock,
            history,
        } = self;

        let registry = Arc::new(registry.unwrap_or_else(|| WorkloadRegistry::with_defaults(config.workload)));
        let probe: Arc<dyn DeviceProbe> = probe.unwrap_or_else(|| Arc::new(SystemProbe) as Arc<dyn DeviceProbe>);
        let clock: Arc<dyn Clock> = clock.unwrap_or_else(|| Arc::new(QuantaClock::new()) as Arc<dyn Clock>);
        let history: Arc<dyn HistoryStore> =
            history.unwrap_or_else(|| Arc::new(NullHistory) as Arc<dyn HistoryStore>);

        let runner = PassRunner::new(
            Arc::clone(&registry),
            probe,
            clock,
            Warmup::new(config.warmup.clone()),
        );
        let worker = Worker::new(runner, history)
            .with_status_sample_limit(config.status_sample_limit)
            .spawn()?;
        let queue = JobQueue::new(worker.inbox(), config.queue_node_limit);
        let (events_tx, events_rx) = unbounded();

        info!(workloads = registry.len(), "Benchmark engine started");
        Ok(Engine {
            registry,
            queue,
            worker: Some(worker),
            events_tx,
            events_rx,
            next_id: 1,
        })
    }
}

/// Serializes benchmark requests onto a single worker.
///
/// All methods run on the caller's thread; only the worker touches the
/// device under test.
pub struct Engine {
    registry: Arc<WorkloadRegistry>,
    queue: JobQueue,
    worker: Option<WorkerHandle>,
    events_tx: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
    next_id: JobId,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            registry: None,
            probe: None,
            clock: None,
            history: None,
        }
    }

    /// Engine with the default workload catalog, system probe, TSC clock and no history.
    pub fn start(config: EngineConfig) -> Result<Self> {
        Self::builder(config).start()
    }

    pub fn registry(&self) -> &WorkloadRegistry {
        &self.registry
    }

    /// Validate and enqueue a request.
    pub fn submit(&mut self, request: BenchRequest) -> Result<(JobId, EnqueueOutcome)> {
        request.validate()?;
        let id = self.next_id;
        self.next_id += 1;

        let job = Job::new(id, request, self.events_tx.clone());
        let outcome = self.queue.enqueue(job)?;
        debug!(job_id = id, ?outcome, "Job submitted");
        Ok((id, outcome))
    }

    /// Next event from the worker, blocking while a job is in flight.
    ///
    /// A `Released` event dispatches the next queued job before it is
    /// returned. `None` means the worker is idle and nothing is queued.
    pub fn next_event(&mut self) -> Result<Option<WorkerEvent>> {
        loop {
            if !self.queue.is_busy() {
                return Ok(self.events_rx.try_recv().ok());
            }
            match self.events_rx.recv_timeout(LIVENESS_POLL) {
                Ok(event) => {
                    if let WorkerEvent::Released { job_id } = &event {
                        self.queue.release(*job_id)?;
                    }
                    return Ok(Some(event));
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !self.worker_running() {
                        return Err(EngineError::WorkerGone);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(EngineError::WorkerGone),
            }
        }
    }

    /// Submit every request, then pump events until all of them are done.
    ///
    /// `on_event` sees every event in order. Returns the terminal statuses.
    pub fn run_all(
        &mut self,
        requests: impl IntoIterator<Item = BenchRequest>,
        mut on_event: impl FnMut(&WorkerEvent),
    ) -> Result<Vec<Status>> {
        for request in requests {
            self.submit(request)?;
        }

        let mut finished = Vec::new();
        while let Some(event) = self.next_event()? {
            on_event(&event);
            if let WorkerEvent::Status(status) = event
                && status.finished
            {
                finished.push(status);
            }
        }
        Ok(finished)
    }

    /// No job in flight and none waiting.
    pub fn is_idle(&self) -> bool {
        !self.queue.is_busy() && self.queue.is_empty()
    }

    /// Jobs waiting behind the in-flight one.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drop every waiting job; the in-flight job still runs to completion.
    pub fn discard_pending(&mut self) -> usize {
        self.queue.cleanup()
    }

    /// Discard waiting jobs, let the current one finish and stop the worker.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.queue.cleanup();
        match self.worker.take() {
            Some(worker) => {
                worker.quit()?;
                info!("Benchmark engine stopped");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn worker_running(&self) -> bool {
        self.worker.as_ref().is_some_and(WorkerHandle::is_running)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            debug!(error = %e, "Engine stop during drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TestType, WarmupConfig};
    use crate::testing::{mb, FakeProbe, ScriptedWorkload, StepClock};

    fn engine(config: EngineConfig, workloads: Vec<ScriptedWorkload>) -> Engine {
        let mut registry = WorkloadRegistry::new();
        for workload in workloads {
            registry.register(Arc::new(workload));
        }
        Engine::builder(EngineConfig {
            warmup: WarmupConfig {
                enabled: false,
                ..WarmupConfig::default()
            },
            ..config
        })
        .registry(registry)
        .probe(Arc::new(FakeProbe::new()))
        .clock(Arc::new(StepClock::new()))
        .start()
        .unwrap()
    }

    #[test]
    fn test_jobs_complete_in_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let (write, _) = ScriptedWorkload::new(TestType::SequentialWrite, vec![mb(1)]);
        let (read, _) = ScriptedWorkload::new(TestType::SequentialRead, vec![mb(2)]);
        let mut engine = engine(EngineConfig::default(), vec![write, read]);

        let statuses = engine
            .run_all(
                [
                    BenchRequest::new(TestType::SequentialWrite, dir.path()),
                    BenchRequest::new(TestType::SequentialRead, dir.path()),
                    BenchRequest::new(TestType::SequentialWrite, dir.path()),
                ],
                |_| {},
            )
            .unwrap();

        let ids: Vec<JobId> = statuses.iter().map(|s| s.job_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(statuses.iter().all(|s| s.success));
        assert!(engine.is_idle());
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_busy_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let (write, _) = ScriptedWorkload::new(TestType::SequentialWrite, vec![mb(1), mb(1)]);
        let mut engine = engine(EngineConfig::default(), vec![write]);

        let (_, outcome) = engine
            .submit(BenchRequest::new(TestType::SequentialWrite, dir.path()))
            .unwrap();
        assert_eq!(outcome, EnqueueOutcome::Dispatched);
        let (_, outcome) = engine
            .submit(BenchRequest::new(TestType::SequentialWrite, dir.path()))
            .unwrap();
        assert_eq!(outcome, EnqueueOutcome::Queued);
        assert_eq!(engine.pending(), 1);

        let mut saw_terminal_for_first = false;
        while let Some(event) = engine.next_event().unwrap() {
            match event {
                WorkerEvent::Status(s) if s.finished && s.job_id == 1 => {
                    saw_terminal_for_first = true;
                    // Terminal status arrives before the release: job 2 still waits.
                    assert!(!engine.is_idle());
                    assert_eq!(engine.pending(), 1);
                }
                WorkerEvent::Released { job_id: 1 } => {
                    assert!(saw_terminal_for_first);
                    assert_eq!(engine.pending(), 0);
                }
                _ => {}
            }
        }
        assert!(engine.is_idle());
    }

    #[test]
    fn test_invalid_request_rejected() {
        let mut engine = engine(EngineConfig::default(), Vec::new());
        let err = engine
            .submit(BenchRequest::new(TestType::Metadata, "/definitely/not/here"))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
        assert!(engine.is_idle());
        assert!(engine.next_event().unwrap().is_none());
    }

    #[test]
    fn test_queue_degrade_path() {
        let dir = tempfile::tempdir().unwrap();
        let (write, _) = ScriptedWorkload::new(TestType::SequentialWrite, vec![mb(1)]);
        let config = EngineConfig {
            queue_node_limit: Some(0),
            ..EngineConfig::default()
        };
        let mut engine = engine(config, vec![write]);

        let (_, first) = engine
            .submit(BenchRequest::new(TestType::SequentialWrite, dir.path()))
            .unwrap();
        let (_, second) = engine
            .submit(BenchRequest::new(TestType::SequentialWrite, dir.path()))
            .unwrap();
        assert_eq!(first, EnqueueOutcome::DispatchedDirect);
        assert_eq!(second, EnqueueOutcome::Dropped);

        let mut seen = Vec::new();
        let statuses = engine
            .run_all(Vec::new(), |event| {
                seen.push(match event {
                    WorkerEvent::Status(s) => s.job_id,
                    WorkerEvent::Released { job_id } => *job_id,
                });
            })
            .unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].job_id, 1);
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|&id| id == 1));
    }
}
