// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Obsrisk Worker - Obsolescence Risk Background Service
//!
//! This crate hosts the risk engine from `obsrisk-core` as a queue worker. It
//! provides the PostgreSQL repository, the product-licensing HTTP client, a
//! persistent job queue and a cron scheduler that pushes the risk job.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   push {type: "ob"}   ┌──────────────────────────────┐
//! │  RiskScheduler   │──────────────────────►│           JobQueue           │
//! │  (cron, UTC)     │                       │  claim ─► RiskWorker ─► mark │
//! └──────────────────┘                       └──────────────┬───────────────┘
//!          ▲                                                │ run
//!          │ RiskRuntime::trigger                           ▼
//!                                             ┌──────────────────────────────┐
//!                                             │   RiskCalculator (core)      │
//!                                             └──────┬──────────────┬────────┘
//!                                                    │              │
//!                                                    ▼              ▼
//!                                  ┌────────────────────────┐ ┌──────────────────┐
//!                                  │ PostgresRiskRepository │ │ HttpProductClient│
//!                                  └───────────┬────────────┘ └────────┬─────────┘
//!                                              ▼                       ▼
//!                               ┌──────────────────────────┐ ┌────────────────────┐
//!                               │ PostgreSQL (apps, jobs)  │ │ product gateway    │
//!                               └──────────────────────────┘ └────────────────────┘
//! ```
//!
//! # Job Status State Machine
//!
//! ```text
//!   PENDING ──claim──► RUNNING ──ok──► COMPLETED
//!      ▲                  │
//!      │ cancelled        │ error
//!      │ / backoff        ▼
//!      └───────────────  RETRY ──retries exhausted──► FAILED
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `OBSRISK_DATABASE_URL` | Yes* | - | PostgreSQL connection string |
//! | `DATABASE_URL` | Yes* | - | Fallback if above not set |
//! | `OBSRISK_DB_MAX_CONNECTIONS` | No | `10` | Pool size |
//! | `OBSRISK_WORKER_ID` | No | `ob` | Worker id and risk job type |
//! | `OBSRISK_PRODUCT_SERVICE_URL` | No | `http://127.0.0.1:8080` | Product gateway |
//! | `OBSRISK_PRODUCT_API_TOKEN` | No | - | Static bearer token |
//! | `OBSRISK_AUTH_URL` | No | - | Password-grant token endpoint |
//! | `OBSRISK_AUTH_USERNAME` | With auth URL | - | Password-grant user |
//! | `OBSRISK_AUTH_PASSWORD` | With auth URL | - | Password-grant password |
//! | `OBSRISK_REQUEST_TIMEOUT_MS` | No | `30000` | HTTP timeout |
//! | `OBSRISK_RIGHTS_PAGE_SIZE` | No | `50` | Acquired rights page size |
//! | `OBSRISK_CRON` | No | `0 0 * * *` | Risk job schedule |
//! | `OBSRISK_SCHEDULER_ENABLED` | No | `true` | Enable the cron trigger |
//! | `OBSRISK_RUN_ON_STARTUP` | No | `false` | Push a job at startup |
//! | `OBSRISK_QUEUE_POLL_INTERVAL_MS` | No | `100` | Queue poll rate |
//! | `OBSRISK_QUEUE_RETRIES` | No | `3` | Retries per job |
//! | `OBSRISK_QUEUE_BASE_DELAY_MS` | No | `3000` | Retry backoff base |
//!
//! # Modules
//!
//! - [`config`]: Worker configuration from environment variables
//! - [`error`]: Error types for worker operations
//! - [`product_client`]: Product-licensing gateway client
//! - [`queue`]: Persistent job queue and worker trait
//! - [`repository`]: PostgreSQL implementation of the risk repository
//! - [`risk_worker`]: Queue worker running the risk calculator
//! - [`runtime`]: Embeddable runtime wiring it all together
//! - [`scheduler`]: Cron trigger for the risk job

/// Database migrations for obsrisk-worker.
///
/// ```ignore
/// use obsrisk_worker::migrations;
///
/// let pool = PgPool::connect(&database_url).await?;
/// migrations::run(&pool).await?;
/// ```
pub mod migrations;

/// Worker configuration loaded from environment variables.
pub mod config;

/// Error types for worker operations.
pub mod error;

/// HTTP client for the product-licensing service.
pub mod product_client;

/// Persistent job queue.
pub mod queue;

/// PostgreSQL risk repository.
pub mod repository;

/// Queue worker computing obsolescence risks.
pub mod risk_worker;

/// Embeddable runtime.
pub mod runtime;

/// Cron scheduler pushing risk jobs.
pub mod scheduler;

pub use error::{Error, Result};
pub use runtime::{RiskRuntime, RiskRuntimeBuilder};
