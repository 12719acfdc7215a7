// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cron trigger for the risk job.
//!
//! Sleeps until the next occurrence of the configured cron expression, then
//! pushes a risk job (`{type: worker_id, data: {}}`) onto the queue. A failed
//! push is logged and the schedule carries on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use croner::Cron;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::queue::JobQueue;

/// Configuration for the risk scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Whether the cron trigger runs.
    pub enabled: bool,
    /// Five-field cron expression, evaluated in UTC.
    pub cron: String,
    /// Push one job as soon as the scheduler starts.
    pub run_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "0 0 * * *".to_string(), // daily at midnight
            run_on_startup: false,
        }
    }
}

/// Pushes risk jobs on a cron schedule.
pub struct RiskScheduler {
    queue: Arc<JobQueue>,
    job_type: String,
    cron: Cron,
    config: SchedulerConfig,
    shutdown: Arc<Notify>,
}

impl RiskScheduler {
    /// Create a scheduler. Fails if the cron expression does not parse.
    pub fn new(
        queue: Arc<JobQueue>,
        job_type: impl Into<String>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let cron = Cron::new(&config.cron).parse()?;
        Ok(Self {
            queue,
            job_type: job_type.into(),
            cron,
            config,
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// First occurrence strictly after `after`.
    pub fn next_run_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
        Ok(self.cron.find_next_occurrence(&after, false)?)
    }

    /// Push one risk job now. Returns the job id.
    pub async fn push_risk_job(&self) -> Result<i32> {
        self.queue
            .push_job(&self.job_type, serde_json::json!({}))
            .await
    }

    /// Run the scheduler loop until shutdown is signalled.
    pub async fn run(&self) {
        if self.config.run_on_startup {
            self.trigger("startup").await;
        }

        if !self.config.enabled {
            info!("Risk scheduler disabled");
            return;
        }

        info!(cron = %self.config.cron, job_type = %self.job_type, "Risk scheduler started");

        loop {
            let now = Utc::now();
            let next = match self.next_run_after(now) {
                Ok(next) => next,
                Err(e) => {
                    error!(
                        error = %e,
                        cron = %self.config.cron,
                        "No next occurrence, stopping scheduler"
                    );
                    break;
                }
            };
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next_run = %next, wait_secs = wait.as_secs(), "Next risk job scheduled");

            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Risk scheduler received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(wait) => {
                    self.trigger("cron").await;
                }
            }
        }

        info!("Risk scheduler stopped");
    }

    async fn trigger(&self, reason: &'static str) {
        match self.push_risk_job().await {
            Ok(job_id) => {
                info!(
                    job_id = job_id,
                    job_type = %self.job_type,
                    trigger = reason,
                    "Risk job pushed"
                );
            }
            Err(e) => {
                error!(
                    error = %e,
                    job_type = %self.job_type,
                    trigger = reason,
                    "Failed to push risk job"
                );
            }
        }
    }
}
