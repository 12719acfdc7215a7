// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable job storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use super::job::{Job, JobStatus, ResumeSummary};
use crate::error::{Error, Result};

/// Storage of queued jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a PENDING job and return its id.
    async fn create_job(&self, job_type: &str, data: &Value) -> Result<i32>;

    /// Atomically claim the oldest PENDING job: mark it RUNNING and set its start time.
    async fn claim_next_pending(&self) -> Result<Option<Job>>;

    /// Mark a job RETRY and increment its retry count. Returns the new count.
    async fn mark_retry(&self, job_id: i32) -> Result<i32>;

    /// Mark a job COMPLETED and set its end time.
    async fn mark_completed(&self, job_id: i32) -> Result<()>;

    /// Mark a job FAILED with a comment and set its end time.
    async fn mark_failed(&self, job_id: i32, comment: &str) -> Result<()>;

    /// Put a job back to PENDING without consuming a retry.
    async fn requeue(&self, job_id: i32) -> Result<()>;

    /// Recover jobs left RUNNING or RETRY by a previous process.
    ///
    /// Jobs with retries left go back to PENDING, the others are FAILED.
    async fn resume_interrupted(&self, max_retries: u32) -> Result<ResumeSummary>;

    /// Fetch a job by id.
    async fn get_job(&self, job_id: i32) -> Result<Option<Job>>;
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct JobRecord {
    job_id: i32,
    job_type: String,
    status: String,
    data: Value,
    comments: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl TryFrom<JobRecord> for Job {
    type Error = Error;

    fn try_from(record: JobRecord) -> Result<Self> {
        let status = JobStatus::parse(&record.status)
            .ok_or_else(|| Error::Other(format!("Unknown job status: {}", record.status)))?;
        Ok(Self {
            id: record.job_id,
            job_type: record.job_type,
            status,
            data: record.data,
            comments: record.comments,
            retry_count: record.retry_count,
            created_at: record.created_at,
            start_time: record.start_time,
            end_time: record.end_time,
        })
    }
}

const JOB_COLUMNS: &str = "job_id, type AS job_type, status::text AS status, data, comments, \
                           retry_count, created_at, start_time, end_time";

/// PostgreSQL job store over the `jobs` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_status(&self, job_id: i32, status: JobStatus, finished: bool) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2::job_status,
                end_time = CASE WHEN $3 THEN NOW() ELSE end_time END
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(finished)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::JobNotFound(job_id));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, job_type: &str, data: &Value) -> Result<i32> {
        let (job_id,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO jobs (type, status, data)
            VALUES ($1, 'PENDING', $2)
            RETURNING job_id
            "#,
        )
        .bind(job_type)
        .bind(data)
        .fetch_one(&self.pool)
        .await?;

        Ok(job_id)
    }

    async fn claim_next_pending(&self) -> Result<Option<Job>> {
        let query = format!(
            r#"
            UPDATE jobs
            SET status = 'RUNNING', start_time = NOW()
            WHERE job_id = (
                SELECT job_id FROM jobs
                WHERE status = 'PENDING'
                ORDER BY created_at, job_id
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING {JOB_COLUMNS}
            "#
        );

        let record = sqlx::query_as::<_, JobRecord>(&query)
            .fetch_optional(&self.pool)
            .await?;

        record.map(Job::try_from).transpose()
    }

    async fn mark_retry(&self, job_id: i32) -> Result<i32> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET status = 'RETRY', retry_count = retry_count + 1
            WHERE job_id = $1
            RETURNING retry_count
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(count,)| count)
            .ok_or(Error::JobNotFound(job_id))
    }

    async fn mark_completed(&self, job_id: i32) -> Result<()> {
        self.set_status(job_id, JobStatus::Completed, true).await
    }

    async fn mark_failed(&self, job_id: i32, comment: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'FAILED', comments = $2, end_time = NOW()
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .bind(comment)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::JobNotFound(job_id));
        }
        Ok(())
    }

    async fn requeue(&self, job_id: i32) -> Result<()> {
        self.set_status(job_id, JobStatus::Pending, false).await
    }

    async fn resume_interrupted(&self, max_retries: u32) -> Result<ResumeSummary> {
        let max_retries = i32::try_from(max_retries).unwrap_or(i32::MAX);
        let mut tx = self.pool.begin().await?;

        let failed = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'FAILED', comments = 'retries exceeded', end_time = NOW()
            WHERE status IN ('RUNNING', 'RETRY') AND retry_count >= $1
            "#,
        )
        .bind(max_retries)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let resumed = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'PENDING'
            WHERE status IN ('RUNNING', 'RETRY')
            "#,
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        Ok(ResumeSummary { resumed, failed })
    }

    async fn get_job(&self, job_id: i32) -> Result<Option<Job>> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1");

        let record = sqlx::query_as::<_, JobRecord>(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        record.map(Job::try_from).transpose()
    }
}
