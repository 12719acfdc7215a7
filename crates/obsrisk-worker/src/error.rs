// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for obsrisk-worker.

use thiserror::Error;

/// Worker errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Cron expression could not be parsed or evaluated.
    #[error("Cron error: {0}")]
    Cron(#[from] croner::errors::CronError),

    /// Job was not found.
    #[error("Job not found: {0}")]
    JobNotFound(i32),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type using the worker Error.
pub type Result<T> = std::result::Result<T, Error>;
