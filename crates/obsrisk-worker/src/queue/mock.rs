// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory job store for testing.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use super::job::{Job, JobStatus, ResumeSummary};
use super::store::JobStore;
use crate::error::{Error, Result};

/// Job store keeping rows in a vector, oldest first.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<Vec<Job>>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job as-is, e.g. one left RUNNING by a crashed process.
    pub async fn insert(&self, job: Job) {
        self.jobs.lock().await.push(job);
    }

    /// Snapshot of every job.
    pub async fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().await.clone()
    }

    async fn update<F>(&self, job_id: i32, f: F) -> Result<i32>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or(Error::JobNotFound(job_id))?;
        f(job);
        Ok(job.retry_count)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, job_type: &str, data: &Value) -> Result<i32> {
        let mut jobs = self.jobs.lock().await;
        let id = jobs.iter().map(|job| job.id).max().unwrap_or(0) + 1;
        jobs.push(Job {
            id,
            job_type: job_type.to_string(),
            status: JobStatus::Pending,
            data: data.clone(),
            comments: None,
            retry_count: 0,
            created_at: Utc::now(),
            start_time: None,
            end_time: None,
        });
        Ok(id)
    }

    async fn claim_next_pending(&self) -> Result<Option<Job>> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs
            .iter_mut()
            .find(|job| job.status == JobStatus::Pending)
        else {
            return Ok(None);
        };
        job.status = JobStatus::Running;
        job.start_time = Some(Utc::now());
        Ok(Some(job.clone()))
    }

    async fn mark_retry(&self, job_id: i32) -> Result<i32> {
        self.update(job_id, |job| {
            job.status = JobStatus::Retry;
            job.retry_count += 1;
        })
        .await
    }

    async fn mark_completed(&self, job_id: i32) -> Result<()> {
        self.update(job_id, |job| {
            job.status = JobStatus::Completed;
            job.end_time = Some(Utc::now());
        })
        .await
        .map(|_| ())
    }

    async fn mark_failed(&self, job_id: i32, comment: &str) -> Result<()> {
        self.update(job_id, |job| {
            job.status = JobStatus::Failed;
            job.comments = Some(comment.to_string());
            job.end_time = Some(Utc::now());
        })
        .await
        .map(|_| ())
    }

    async fn requeue(&self, job_id: i32) -> Result<()> {
        self.update(job_id, |job| job.status = JobStatus::Pending)
            .await
            .map(|_| ())
    }

    async fn resume_interrupted(&self, max_retries: u32) -> Result<ResumeSummary> {
        let mut summary = ResumeSummary::default();
        let now = Utc::now();
        for job in self.jobs.lock().await.iter_mut() {
            if !matches!(job.status, JobStatus::Running | JobStatus::Retry) {
                continue;
            }
            if job.retry_count as i64 >= max_retries as i64 {
                job.status = JobStatus::Failed;
                job.comments = Some("retries exceeded".to_string());
                job.end_time = Some(now);
                summary.failed += 1;
            } else {
                job.status = JobStatus::Pending;
                summary.resumed += 1;
            }
        }
        Ok(summary)
    }

    async fn get_job(&self, job_id: i32) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .lock()
            .await
            .iter()
            .find(|job| job.id == job_id)
            .cloned())
    }
}
