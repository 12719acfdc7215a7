// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable job queue.
//!
//! Jobs are rows in the `jobs` table. The queue polls for PENDING jobs, claims
//! them one at a time and dispatches each to the [`Worker`] registered for its
//! type. The worker's answer drives the row's status:
//!
//! | Worker result | Retries left | Job becomes |
//! |---------------|--------------|-------------|
//! | `Ok(())` | - | COMPLETED |
//! | `Retry` | yes | RETRY, then run again after `base_delay * 2^retry_count` |
//! | `Retry` | no | FAILED, reason stored as comment |
//! | `Cancelled` | - | PENDING (resumed on next start) |
//!
//! Jobs found RUNNING or RETRY at startup were interrupted by a previous
//! process and are resumed or failed according to their retry count.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;

mod job;
pub mod mock;
mod store;
mod worker;

pub use job::{Job, JobStatus, ResumeSummary};
pub use store::{JobStore, PgJobStore};
pub use worker::{Worker, WorkerError};

/// Configuration for the job queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How often to poll for pending jobs when idle.
    pub poll_interval: Duration,
    /// Retries allowed per job after the first attempt.
    pub retries: u32,
    /// Base of the exponential retry backoff.
    pub base_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            retries: 3,
            base_delay: Duration::from_secs(3),
        }
    }
}

impl QueueConfig {
    /// Delay before the attempt following `retry_count` consumed retries.
    pub fn backoff(&self, retry_count: i32) -> Duration {
        let exponent = retry_count.clamp(0, 16) as u32;
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Final state of a processed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The worker succeeded.
    Completed,
    /// No worker for the type, or retries exhausted.
    Failed,
    /// Cancelled and put back to PENDING.
    Requeued,
}

/// Polls the job store and dispatches jobs to registered workers.
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    workers: HashMap<String, Arc<dyn Worker>>,
    config: QueueConfig,
    shutdown: Arc<Notify>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
}

impl JobQueue {
    /// Create a queue with no workers.
    pub fn new(store: Arc<dyn JobStore>, config: QueueConfig) -> Self {
        Self {
            store,
            workers: HashMap::new(),
            config,
            shutdown: Arc::new(Notify::new()),
            wake: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Register a worker for the job type equal to its id.
    ///
    /// A worker registered under an existing id replaces the previous one.
    pub fn register_worker(&mut self, worker: Arc<dyn Worker>) {
        let id = worker.id().to_string();
        if self.workers.insert(id.clone(), worker).is_some() {
            warn!(worker_id = %id, "Replacing previously registered worker");
        } else {
            debug!(worker_id = %id, "Worker registered");
        }
    }

    /// Insert a PENDING job and wake the run loop. Returns the job id.
    pub async fn push_job(&self, job_type: &str, data: Value) -> Result<i32> {
        let job_id = self.store.create_job(job_type, &data).await?;
        debug!(job_id = job_id, job_type = job_type, "Job pushed");
        self.wake.notify_one();
        Ok(job_id)
    }

    /// Stop the run loop and cancel the job in progress.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.shutdown.notify_one();
    }

    /// Run the queue loop until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) {
        match self.store.resume_interrupted(self.config.retries).await {
            Ok(summary) if summary.resumed > 0 || summary.failed > 0 => {
                info!(
                    resumed = summary.resumed,
                    failed = summary.failed,
                    "Recovered interrupted jobs"
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Failed to resume interrupted jobs");
            }
        }

        info!(
            workers = ?self.workers.keys().collect::<Vec<_>>(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            retries = self.config.retries,
            "Job queue started"
        );

        while !self.cancel.is_cancelled() {
            while !self.cancel.is_cancelled() {
                match self.process_next().await {
                    Ok(Some(_)) => continue,
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "Failed to process job");
                        break;
                    }
                }
            }

            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Job queue received shutdown signal");
                    break;
                }

                _ = self.wake.notified() => {}

                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Job queue stopped");
    }

    /// Claim and process the next pending job, if any.
    pub async fn process_next(&self) -> Result<Option<(i32, JobOutcome)>> {
        let Some(job) = self.store.claim_next_pending().await? else {
            return Ok(None);
        };
        let job_id = job.id;
        let outcome = self.process_job(job).await?;
        Ok(Some((job_id, outcome)))
    }

    async fn process_job(&self, mut job: Job) -> Result<JobOutcome> {
        let Some(worker) = self.workers.get(&job.job_type).cloned() else {
            warn!(job_id = job.id, job_type = %job.job_type, "No worker registered for job type");
            self.store
                .mark_failed(job.id, &format!("no worker registered for type '{}'", job.job_type))
                .await?;
            return Ok(JobOutcome::Failed);
        };

        loop {
            debug!(
                job_id = job.id,
                worker_id = worker.id(),
                retry_count = job.retry_count,
                "Processing job"
            );

            match worker.do_work(&job, &self.cancel).await {
                Ok(()) => {
                    self.store.mark_completed(job.id).await?;
                    info!(job_id = job.id, worker_id = worker.id(), "Job completed");
                    return Ok(JobOutcome::Completed);
                }
                Err(WorkerError::Cancelled) => {
                    self.store.requeue(job.id).await?;
                    info!(job_id = job.id, worker_id = worker.id(), "Job cancelled, requeued");
                    return Ok(JobOutcome::Requeued);
                }
                Err(WorkerError::Retry { reason }) => {
                    if (job.retry_count as i64) >= self.config.retries as i64 {
                        error!(
                            job_id = job.id,
                            worker_id = worker.id(),
                            retry_count = job.retry_count,
                            reason = %reason,
                            "Retries exceeded, job failed"
                        );
                        self.store.mark_failed(job.id, &reason).await?;
                        return Ok(JobOutcome::Failed);
                    }

                    let delay = self.config.backoff(job.retry_count);
                    job.retry_count = self.store.mark_retry(job.id).await?;
                    warn!(
                        job_id = job.id,
                        worker_id = worker.id(),
                        retry_count = job.retry_count,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Job attempt failed, retrying"
                    );

                    tokio::select! {
                        biased;

                        _ = self.cancel.cancelled() => {
                            self.store.requeue(job.id).await?;
                            info!(job_id = job.id, "Queue shutting down, job requeued");
                            return Ok(JobOutcome::Requeued);
                        }

                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::mock::InMemoryJobStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Worker answering from a script, then succeeding.
    struct ScriptedWorker {
        id: String,
        script: Mutex<VecDeque<std::result::Result<(), WorkerError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedWorker {
        fn new(id: &str, script: Vec<std::result::Result<(), WorkerError>>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Worker for ScriptedWorker {
        fn id(&self) -> &str {
            &self.id
        }

        async fn do_work(
            &self,
            _job: &Job,
            _cancel: &CancellationToken,
        ) -> std::result::Result<(), WorkerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    fn queue_with(
        store: &Arc<InMemoryJobStore>,
        config: QueueConfig,
        worker: Arc<ScriptedWorker>,
    ) -> JobQueue {
        let mut queue = JobQueue::new(store.clone(), config);
        queue.register_worker(worker);
        queue
    }

    fn fast_config(retries: u32) -> QueueConfig {
        QueueConfig {
            poll_interval: Duration::from_millis(10),
            retries,
            base_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_config_default() {
        let config = QueueConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.retries, 3);
        assert_eq!(config.base_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_doubles() {
        let config = QueueConfig::default();
        assert_eq!(config.backoff(0), Duration::from_secs(3));
        assert_eq!(config.backoff(1), Duration::from_secs(6));
        assert_eq!(config.backoff(2), Duration::from_secs(12));
        assert_eq!(config.backoff(-1), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_completed_job() {
        let store = Arc::new(InMemoryJobStore::new());
        let worker = ScriptedWorker::new("ob", vec![]);
        let queue = queue_with(&store, fast_config(3), worker.clone());

        let job_id = queue.push_job("ob", serde_json::json!({})).await.unwrap();
        let processed = queue.process_next().await.unwrap();

        assert_eq!(processed, Some((job_id, JobOutcome::Completed)));
        let job = store.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.start_time.is_some());
        assert!(job.end_time.is_some());
        assert_eq!(worker.calls(), 1);
    }

    #[tokio::test]
    async fn test_nothing_pending() {
        let store = Arc::new(InMemoryJobStore::new());
        let queue = queue_with(&store, fast_config(3), ScriptedWorker::new("ob", vec![]));

        assert_eq!(queue.process_next().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_complete() {
        let store = Arc::new(InMemoryJobStore::new());
        let worker = ScriptedWorker::new("ob", vec![Err(WorkerError::retry("db down"))]);
        let queue = queue_with(&store, QueueConfig::default(), worker.clone());

        let job_id = queue.push_job("ob", serde_json::json!({})).await.unwrap();
        let processed = queue.process_next().await.unwrap();

        assert_eq!(processed, Some((job_id, JobOutcome::Completed)));
        let job = store.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.retry_count, 1);
        assert_eq!(worker.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let store = Arc::new(InMemoryJobStore::new());
        let worker = ScriptedWorker::new(
            "ob",
            vec![
                Err(WorkerError::retry("first")),
                Err(WorkerError::retry("second")),
                Err(WorkerError::retry("third")),
            ],
        );
        let queue = queue_with(&store, fast_config(2), worker.clone());

        let job_id = queue.push_job("ob", serde_json::json!({})).await.unwrap();
        let processed = queue.process_next().await.unwrap();

        assert_eq!(processed, Some((job_id, JobOutcome::Failed)));
        let job = store.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 2);
        assert_eq!(job.comments.as_deref(), Some("third"));
        assert_eq!(worker.calls(), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_fails_immediately() {
        let store = Arc::new(InMemoryJobStore::new());
        let worker = ScriptedWorker::new("ob", vec![Err(WorkerError::retry("boom"))]);
        let queue = queue_with(&store, fast_config(0), worker.clone());

        let job_id = queue.push_job("ob", serde_json::json!({})).await.unwrap();
        let processed = queue.process_next().await.unwrap();

        assert_eq!(processed, Some((job_id, JobOutcome::Failed)));
        assert_eq!(worker.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_type_fails() {
        let store = Arc::new(InMemoryJobStore::new());
        let worker = ScriptedWorker::new("ob", vec![]);
        let queue = queue_with(&store, fast_config(3), worker.clone());

        let job_id = queue
            .push_job("dgraph", serde_json::json!({"kind": "upsert"}))
            .await
            .unwrap();
        let processed = queue.process_next().await.unwrap();

        assert_eq!(processed, Some((job_id, JobOutcome::Failed)));
        let job = store.get_job(job_id).await.unwrap().unwrap();
        assert!(job.comments.unwrap().contains("dgraph"));
        assert_eq!(worker.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_job_is_requeued() {
        let store = Arc::new(InMemoryJobStore::new());
        let worker = ScriptedWorker::new("ob", vec![Err(WorkerError::Cancelled)]);
        let queue = queue_with(&store, fast_config(3), worker);

        let job_id = queue.push_job("ob", serde_json::json!({})).await.unwrap();
        let processed = queue.process_next().await.unwrap();

        assert_eq!(processed, Some((job_id, JobOutcome::Requeued)));
        let job = store.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 0);
    }

    #[tokio::test]
    async fn test_shutdown_during_backoff_requeues() {
        let store = Arc::new(InMemoryJobStore::new());
        let worker = ScriptedWorker::new("ob", vec![Err(WorkerError::retry("slow"))]);
        let queue = queue_with(&store, QueueConfig::default(), worker.clone());

        let job_id = queue.push_job("ob", serde_json::json!({})).await.unwrap();
        queue.shutdown();
        let processed = queue.process_next().await.unwrap();

        assert_eq!(processed, Some((job_id, JobOutcome::Requeued)));
        let job = store.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 1);
        assert_eq!(worker.calls(), 1);
    }

    #[tokio::test]
    async fn test_run_processes_pushed_jobs_until_shutdown() {
        let store = Arc::new(InMemoryJobStore::new());
        let worker = ScriptedWorker::new("ob", vec![]);
        let queue = Arc::new(queue_with(&store, fast_config(3), worker.clone()));

        let runner = queue.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        let first = queue.push_job("ob", serde_json::json!({})).await.unwrap();
        let second = queue.push_job("ob", serde_json::json!({})).await.unwrap();

        for _ in 0..100 {
            if worker.calls() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        queue.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("queue should stop")
            .unwrap();

        for job_id in [first, second] {
            let job = store.get_job(job_id).await.unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_run_resumes_interrupted_jobs() {
        let store = Arc::new(InMemoryJobStore::new());
        let interrupted = |id: i32, status: JobStatus, retry_count: i32| Job {
            id,
            job_type: "ob".to_string(),
            status,
            data: serde_json::json!({}),
            comments: None,
            retry_count,
            created_at: chrono::Utc::now(),
            start_time: None,
            end_time: None,
        };
        store.insert(interrupted(1, JobStatus::Running, 0)).await;
        store.insert(interrupted(2, JobStatus::Retry, 3)).await;
        store.insert(interrupted(3, JobStatus::Completed, 0)).await;

        let worker = ScriptedWorker::new("ob", vec![]);
        let queue = Arc::new(queue_with(&store, fast_config(3), worker.clone()));

        let runner = queue.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        for _ in 0..100 {
            if worker.calls() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        queue.shutdown();
        handle.await.unwrap();

        let jobs = store.jobs().await;
        assert_eq!(jobs[0].status, JobStatus::Completed);
        assert_eq!(jobs[1].status, JobStatus::Failed);
        assert_eq!(jobs[1].comments.as_deref(), Some("retries exceeded"));
        assert_eq!(jobs[2].status, JobStatus::Completed);
        assert_eq!(worker.calls(), 1);
    }
}
