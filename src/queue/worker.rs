//! Job workers: poll the queue, run the pipeline, acknowledge the result.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::traits::{ActivatedJob, ActivationRequest, JobQueue};
use crate::pipeline::OperationDispatcher;
use crate::{AmbassadorError, AmbassadorResult};

const BACKOFF_MULTIPLIER: u32 = 2;
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(50);
/// Floor of the polling backoff; a zero interval would never grow.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Settings of one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOptions {
    pub job_type: String,
    pub worker_name: String,
    /// Lease the engine grants each activated job.
    pub timeout: Duration,
    /// Jobs held at once; the ambassador runs with 1.
    pub max_jobs_active: u32,
    pub poll_interval: Duration,
    pub max_backoff: Duration,
}

impl WorkerOptions {
    pub fn new(job_type: impl Into<String>) -> Self {
        WorkerOptions {
            job_type: job_type.into(),
            worker_name: "zkvm-ambassador".to_string(),
            timeout: Duration::from_secs(300),
            max_jobs_active: 1,
            poll_interval: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the backoff bounds. The interval is at least 1 ms and the cap never
    /// below the interval.
    pub fn with_backoff(mut self, poll_interval: Duration, max_backoff: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self.max_backoff = max_backoff.max(self.poll_interval);
        self
    }
}

/// Services one job type, one job at a time.
pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    dispatcher: OperationDispatcher,
    options: WorkerOptions,
}

impl JobWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        dispatcher: OperationDispatcher,
        options: WorkerOptions,
    ) -> Self {
        JobWorker {
            queue,
            dispatcher,
            options,
        }
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    /// Activate and handle at most `max_jobs_active` jobs; returns how many
    /// were handled. Only activation errors are returned.
    pub fn poll_once(&self) -> AmbassadorResult<usize> {
        let request = ActivationRequest {
            job_type: self.options.job_type.clone(),
            worker: self.options.worker_name.clone(),
            timeout_ms: self.options.timeout.as_millis() as u64,
            max_jobs_to_activate: self.options.max_jobs_active,
        };
        let jobs = self.queue.activate(&request)?;
        let count = jobs.len();
        for job in jobs {
            self.handle(job);
        }
        Ok(count)
    }

    /// Poll until `stop` is raised, backing off while the queue is empty.
    pub fn run(&self, stop: &AtomicBool) -> AmbassadorResult<()> {
        tracing::info!("Opened {} worker", self.options.job_type);
        let mut backoff = self.options.poll_interval;
        while !stop.load(Ordering::SeqCst) {
            match self.poll_once() {
                Ok(0) => {
                    tracing::trace!("No {} jobs, backing off for {:?}", self.options.job_type, backoff);
                    sleep_unless_stopped(backoff, stop);
                    backoff = (backoff * BACKOFF_MULTIPLIER).min(self.options.max_backoff);
                }
                Ok(_) => backoff = self.options.poll_interval,
                Err(err) => {
                    tracing::error!(
                        "Failed activating {} jobs: {:#}, bouncing back for {:?}",
                        self.options.job_type,
                        err,
                        backoff
                    );
                    sleep_unless_stopped(backoff, stop);
                    backoff = (backoff * BACKOFF_MULTIPLIER).min(self.options.max_backoff);
                }
            }
        }
        tracing::warn!(
            "Stop request received, shutting down {} worker",
            self.options.job_type
        );
        Ok(())
    }

    fn handle(&self, job: ActivatedJob) {
        let started_at = Instant::now();
        tracing::info!("Received {} job {}", job.job_type, job.job_key);

        let acknowledged = match self.dispatcher.dispatch(&job.job_type, &job.variables) {
            Ok(outcome) => {
                tracing::info!(
                    "{} job {} finished in {:?}",
                    job.job_type,
                    job.job_key,
                    started_at.elapsed()
                );
                self.queue.complete(&job.job_key, &outcome.variables)
            }
            Err(err) => {
                tracing::error!(
                    "Error occurred while processing {} job {}: {:#}",
                    job.job_type,
                    job.job_key,
                    err
                );
                let retries = (job.retries - 1).max(0);
                self.queue.fail(&job.job_key, retries, &format!("{err:#}"))
            }
        };

        // The lease will expire and the engine redelivers the job.
        if let Err(err) = acknowledged {
            tracing::error!(
                "Failed to acknowledge {} job {}: {:#}",
                job.job_type,
                job.job_key,
                err
            );
        }
    }
}

/// Run every worker on its own thread until `stop` is raised.
pub fn run_workers(workers: &[JobWorker], stop: &AtomicBool) -> AmbassadorResult<()> {
    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers.len());
        let mut result = Ok(());
        for worker in workers {
            let spawned = std::thread::Builder::new()
                .name(worker.options.job_type.clone())
                .spawn_scoped(scope, move || worker.run(stop));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Bring down the workers already running.
                    stop.store(true, Ordering::SeqCst);
                    result = Err(AmbassadorError::Message(format!("failed to spawn worker: {e}")));
                    break;
                }
            }
        }

        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => result = Err(err),
                Err(_) => result = Err(AmbassadorError::Message("worker thread panicked".into())),
            }
        }
        result
    })
}

fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep(STOP_CHECK_INTERVAL.min(deadline - now));
    }
}
