// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job records.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Lifecycle of a job row.
///
/// ```text
///  PENDING ──claim──► RUNNING ──ok──► COMPLETED
///     ▲                 │  ▲
///     │ cancelled       │  │ retry (backoff)
///     └─────────────────┤  │
///                       ▼  │
///                     RETRY ──retries exhausted──► FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a queue and being worked on.
    Running,
    /// The last attempt asked for a retry.
    Retry,
    /// Finished successfully.
    Completed,
    /// Gave up.
    Failed,
}

impl JobStatus {
    /// Returns the database representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Retry => "RETRY",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse a status from its database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "RETRY" => Some(Self::Retry),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether the job will not be worked on again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A queued unit of work, dispatched to the worker registered for its type.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Row identifier.
    pub id: i32,
    /// Worker identifier this job is dispatched to.
    pub job_type: String,
    pub status: JobStatus,
    /// Opaque payload. Risk jobs carry `{}`.
    pub data: Value,
    /// Failure reason, set when the job fails.
    pub comments: Option<String>,
    /// Retries already consumed.
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Outcome of resuming jobs left behind by a previous process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeSummary {
    /// Jobs put back to PENDING.
    pub resumed: u64,
    /// Jobs failed because their retries were exhausted.
    pub failed: u64,
}
