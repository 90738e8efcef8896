//! services/worker/src/queue.rs
//!
//! In-process queue substrate: one channel per lane, a small pool of worker
//! tasks per lane, linear backoff with an attempt cap and a hard deadline
//! per job kind. Producers only see the `JobQueue` port, so this whole
//! module could be swapped for an external broker without touching the
//! pipelines.
//!
//! Delivery is at-least-once by design (a retried job may race a duplicate
//! enqueue); the pipelines absorb duplicates by checking entity state
//! before doing any work.

use crate::pipeline::PipelineError;
use async_trait::async_trait;
use cat_tales_core::params::Lane;
use cat_tales_core::ports::{Job, JobQueue, QueueError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Retry contract for one job kind: how many attempts, how long between
/// them, and when to give up entirely.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: &'static [Duration],
    pub deadline: Duration,
}

/// Document extraction: quick jobs, short backoff, give up after 2 hours.
pub const DOCUMENT_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 3,
    backoff: &[
        Duration::from_secs(30),
        Duration::from_secs(120),
        Duration::from_secs(300),
    ],
    deadline: Duration::from_secs(2 * 60 * 60),
};

/// AI generation: slower and more expensive, longer backoff, 6 hours.
pub const SIMPLIFICATION_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 3,
    backoff: &[
        Duration::from_secs(60),
        Duration::from_secs(300),
        Duration::from_secs(900),
    ],
    deadline: Duration::from_secs(6 * 60 * 60),
};

fn policy_for(job: &Job) -> RetryPolicy {
    match job {
        Job::ProcessDocument { .. } => DOCUMENT_RETRY,
        Job::GenerateSimplification { .. } => SIMPLIFICATION_RETRY,
    }
}

/// Executes jobs pulled off the lanes. Implemented by the pipeline bundle;
/// mocked in tests.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: Job) -> Result<(), PipelineError>;

    /// Invoked once after retries are exhausted or the deadline passed, so
    /// the entity can be parked in `failed` instead of appearing to be
    /// in-flight forever.
    async fn on_permanent_failure(&self, job: Job, error: Option<&PipelineError>);
}

#[derive(Debug, Clone)]
struct QueuedJob {
    job: Job,
    attempt: u32,
    first_enqueued: Instant,
}

const LANES: [Lane; 4] = [Lane::Default, Lane::Heavy, Lane::AiDefault, Lane::AiPriority];
const LANE_CAPACITY: usize = 1024;

/// The producer side of the substrate. Cheap to clone.
#[derive(Clone)]
pub struct QueueSubstrate {
    senders: HashMap<Lane, mpsc::Sender<QueuedJob>>,
}

impl QueueSubstrate {
    /// Builds the lanes and spawns `workers_per_lane` consumer tasks per
    /// lane. Workers stop when `shutdown` is cancelled.
    pub fn start(
        runner: Arc<dyn JobRunner>,
        workers_per_lane: usize,
        shutdown: CancellationToken,
    ) -> Self {
        let mut senders = HashMap::new();
        for lane in LANES {
            let (tx, rx) = mpsc::channel::<QueuedJob>(LANE_CAPACITY);
            let rx = Arc::new(Mutex::new(rx));
            for worker_index in 0..workers_per_lane.max(1) {
                tokio::spawn(lane_worker(
                    lane,
                    worker_index,
                    Arc::clone(&rx),
                    tx.clone(),
                    Arc::clone(&runner),
                    shutdown.clone(),
                ));
            }
            senders.insert(lane, tx);
        }
        Self { senders }
    }
}

#[async_trait]
impl JobQueue for QueueSubstrate {
    async fn enqueue(&self, job: Job, lane: Lane) -> Result<(), QueueError> {
        let sender = self
            .senders
            .get(&lane)
            .ok_or(QueueError::Closed(lane.as_str()))?;
        info!(kind = job.kind(), entity = %job.entity_id(), lane = lane.as_str(), "enqueued job");
        sender
            .send(QueuedJob {
                job,
                attempt: 1,
                first_enqueued: Instant::now(),
            })
            .await
            .map_err(|_| QueueError::Closed(lane.as_str()))
    }
}

async fn lane_worker(
    lane: Lane,
    worker_index: usize,
    rx: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    tx: mpsc::Sender<QueuedJob>,
    runner: Arc<dyn JobRunner>,
    shutdown: CancellationToken,
) {
    info!(lane = lane.as_str(), worker_index, "lane worker started");
    loop {
        // The lock is only held while waiting for one message; processing
        // happens after it is released so workers run concurrently.
        let queued = {
            let mut guard = tokio::select! {
                guard = rx.lock() => guard,
                _ = shutdown.cancelled() => break,
            };
            tokio::select! {
                msg = guard.recv() => msg,
                _ = shutdown.cancelled() => break,
            }
        };
        let Some(queued) = queued else { break };
        handle_job(lane, queued, &tx, runner.as_ref()).await;
    }
    info!(lane = lane.as_str(), worker_index, "lane worker stopped");
}

async fn handle_job(
    lane: Lane,
    queued: QueuedJob,
    tx: &mpsc::Sender<QueuedJob>,
    runner: &dyn JobRunner,
) {
    let policy = policy_for(&queued.job);
    let age = queued.first_enqueued.elapsed();
    if age > policy.deadline {
        warn!(
            lane = lane.as_str(),
            kind = queued.job.kind(),
            entity = %queued.job.entity_id(),
            ?age,
            "job exceeded its retry deadline, abandoning"
        );
        runner.on_permanent_failure(queued.job, None).await;
        return;
    }

    match runner.run(queued.job).await {
        Ok(()) => {}
        Err(e) => {
            if queued.attempt >= policy.max_attempts {
                error!(
                    lane = lane.as_str(),
                    kind = queued.job.kind(),
                    entity = %queued.job.entity_id(),
                    attempt = queued.attempt,
                    error = %e,
                    "job failed on final attempt"
                );
                runner.on_permanent_failure(queued.job, Some(&e)).await;
                return;
            }
            let delay = policy.backoff
                [((queued.attempt - 1) as usize).min(policy.backoff.len() - 1)];
            warn!(
                lane = lane.as_str(),
                kind = queued.job.kind(),
                entity = %queued.job.entity_id(),
                attempt = queued.attempt,
                ?delay,
                error = %e,
                "job failed, scheduling retry"
            );
            let tx = tx.clone();
            let retry = QueuedJob {
                attempt: queued.attempt + 1,
                ..queued
            };
            // Delayed redelivery; if the lane shut down meanwhile the retry
            // is dropped with the rest of the queue.
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(retry).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cat_tales_core::ports::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` runs, then succeeds.
    struct FlakyRunner {
        failures: u32,
        runs: AtomicU32,
        permanent: AtomicU32,
    }

    impl FlakyRunner {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                runs: AtomicU32::new(0),
                permanent: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl JobRunner for FlakyRunner {
        async fn run(&self, _job: Job) -> Result<(), PipelineError> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            if run < self.failures {
                Err(PipelineError::Store(StoreError::Unexpected(
                    "transient".into(),
                )))
            } else {
                Ok(())
            }
        }

        async fn on_permanent_failure(&self, _job: Job, _error: Option<&PipelineError>) {
            self.permanent.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_job() -> Job {
        Job::ProcessDocument {
            document_id: uuid::Uuid::new_v4(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn job_retries_with_backoff_then_succeeds() {
        let runner = Arc::new(FlakyRunner::new(2));
        let shutdown = CancellationToken::new();
        let queue = QueueSubstrate::start(runner.clone(), 1, shutdown.clone());

        queue.enqueue(test_job(), Lane::Default).await.unwrap();

        // Paused time auto-advances through the 30s and 120s backoffs.
        while runner.runs.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(runner.runs.load(Ordering::SeqCst), 3);
        assert_eq!(runner.permanent.load(Ordering::SeqCst), 0);
        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_fires_after_attempt_cap() {
        let runner = Arc::new(FlakyRunner::new(u32::MAX));
        let shutdown = CancellationToken::new();
        let queue = QueueSubstrate::start(runner.clone(), 1, shutdown.clone());

        queue.enqueue(test_job(), Lane::Heavy).await.unwrap();

        while runner.permanent.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        // Exactly three attempts, then the permanent-failure hook.
        assert_eq!(runner.runs.load(Ordering::SeqCst), 3);
        assert_eq!(runner.permanent.load(Ordering::SeqCst), 1);
        shutdown.cancel();
    }
}
