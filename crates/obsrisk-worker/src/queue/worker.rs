// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker trait definitions.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::job::Job;

/// How a worker asks the queue to treat a failed attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkerError {
    /// The attempt failed; run the job again after backoff.
    #[error("Retry requested: {reason}")]
    Retry {
        /// Why the attempt failed. Stored as the job comment once retries run out.
        reason: String,
    },

    /// The attempt was cancelled; the job goes back to PENDING.
    #[error("Job cancelled")]
    Cancelled,
}

impl WorkerError {
    /// Build a [`WorkerError::Retry`].
    pub fn retry(reason: impl ToString) -> Self {
        Self::Retry {
            reason: reason.to_string(),
        }
    }
}

/// Handles jobs of one type.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Identifier of the worker, equal to the job type it handles.
    fn id(&self) -> &str;

    /// Process one job. Implementations must return promptly once `cancel` fires.
    async fn do_work(&self, job: &Job, cancel: &CancellationToken) -> Result<(), WorkerError>;
}
