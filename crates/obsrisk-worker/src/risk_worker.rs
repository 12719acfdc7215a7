// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job queue adapter for the risk calculator.
//!
//! Runs one full calculation per job. Calculator errors become a retry request;
//! a cancelled run is reported as cancelled so the queue requeues the job
//! without consuming a retry.

use std::sync::Arc;

use async_trait::async_trait;
use obsrisk_core::{RiskCalculator, RiskError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::queue::{Job, Worker, WorkerError};

/// Queue worker computing obsolescence risks.
pub struct RiskWorker {
    id: String,
    calculator: Arc<RiskCalculator>,
}

impl RiskWorker {
    /// Create a worker registered under `id`.
    pub fn new(id: impl Into<String>, calculator: Arc<RiskCalculator>) -> Self {
        Self {
            id: id.into(),
            calculator,
        }
    }
}

#[async_trait]
impl Worker for RiskWorker {
    fn id(&self) -> &str {
        &self.id
    }

    async fn do_work(&self, job: &Job, cancel: &CancellationToken) -> Result<(), WorkerError> {
        match self.calculator.run(cancel).await {
            Ok(summary) => {
                info!(
                    job_id = job.id,
                    worker_id = %self.id,
                    applications = summary.applications,
                    classified = summary.classified,
                    unclassified = summary.unclassified,
                    skipped = summary.skipped,
                    "Obsolescence risk job finished"
                );
                Ok(())
            }
            Err(RiskError::Cancelled) => Err(WorkerError::Cancelled),
            Err(e) => {
                error!(
                    job_id = job.id,
                    worker_id = %self.id,
                    error = %e,
                    "Obsolescence risk job failed"
                );
                Err(WorkerError::retry(e))
            }
        }
    }
}
