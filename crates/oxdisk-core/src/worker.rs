//! The single thread that performs all benchmark I/O.

use crate::clock;
use crate::error::{EngineError, Result};
use crate::history::HistoryStore;
use crate::job::{Envelope, Job, Status, WorkerEvent};
use crate::runner::PassRunner;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Worker state moved onto the worker thread.
pub struct Worker {
    runner: PassRunner,
    history: Arc<dyn HistoryStore>,
    status_sample_limit: Option<usize>,
}

/// Caller-side handle to a running worker.
pub struct WorkerHandle {
    inbox: Sender<Envelope>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(runner: PassRunner, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            runner,
            history,
            status_sample_limit: None,
        }
    }

    /// Simulate status allocation failure above `limit` samples.
    #[must_use]
    pub fn with_status_sample_limit(mut self, limit: Option<usize>) -> Self {
        self.status_sample_limit = limit;
        self
    }

    /// Start the worker thread.
    ///
    /// The thread first checks that the clock advances; if it does not, the
    /// worker exits before accepting any job and this returns
    /// [`EngineError::ClockUnavailable`].
    pub fn spawn(self) -> Result<WorkerHandle> {
        let (inbox_tx, inbox_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let thread = thread::Builder::new()
            .name("oxdisk-worker".to_string())
            .spawn(move || {
                if let Err(e) = clock::probe(self.runner.clock()) {
                    error!(error = %e, "Worker startup failed");
                    let _ = ready_tx.send(Err(e));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                drop(ready_tx);
                self.run_loop(&inbox_rx);
            })
            .map_err(EngineError::WorkerSpawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Benchmark worker started");
                Ok(WorkerHandle {
                    inbox: inbox_tx,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(EngineError::WorkerGone)
            }
        }
    }

    fn run_loop(&self, inbox: &Receiver<Envelope>) {
        for envelope in inbox {
            match envelope {
                Envelope::Run(job) => self.process(job),
                Envelope::Quit { ack } => {
                    debug!("Worker received quit");
                    let _ = ack.send(());
                    break;
                }
            }
        }
        info!("Benchmark worker stopped");
    }

    /// Run one job to completion and reply: progress, terminal status, release.
    fn process(&self, job: Job) {
        let Job { id, request, reply } = job;
        let test_type = request.test_type;
        debug!(job_id = id, %test_type, target = %request.target.display(), "Processing job");

        let progress = |text: &str| {
            if reply
                .send(WorkerEvent::Status(Status::progress(id, test_type, text)))
                .is_err()
            {
                trace!(job_id = id, "Progress dropped, caller gone");
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.runner.run(&request, Some(&progress))
        }))
        .unwrap_or_else(|_| Err(EngineError::WorkloadPanicked(test_type)));

        let terminal = match outcome {
            Ok(run) => {
                if let Err(e) = self.history.append(&run.result) {
                    warn!(job_id = id, error = %EngineError::History(e), "Result not persisted");
                }
                Status::completed(id, run, self.status_sample_limit)
            }
            Err(e) => {
                warn!(job_id = id, %test_type, error = %e, "Benchmark failed");
                Ok(Status::failed(id, test_type, &e))
            }
        };

        match terminal {
            Ok(status) => {
                let _ = reply.send(WorkerEvent::Status(status));
            }
            Err(e) => warn!(job_id = id, error = %e, "No terminal status sent"),
        }
        let _ = reply.send(WorkerEvent::Released { job_id: id });
    }
}

impl WorkerHandle {
    /// Sender for the worker's inbox.
    pub fn inbox(&self) -> Sender<Envelope> {
        self.inbox.clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the worker to stop after its current job and wait for it.
    pub fn quit(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let (ack_tx, ack_rx) = bounded(1);
        if self.inbox.send(Envelope::Quit { ack: ack_tx }).is_ok() {
            let _ = ack_rx.recv();
        }
        thread.join().map_err(|_| {
            error!("Benchmark worker panicked");
            EngineError::WorkerGone
        })
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            debug!(error = %e, "Worker stop during drop failed");
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
