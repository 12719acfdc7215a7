// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database migrations for obsrisk-worker.
//!
//! Creates the application and obsolescence configuration tables read by the
//! risk repository, and the `jobs` table backing the job queue.
//!
//! # Example
//!
//! ```ignore
//! use sqlx::PgPool;
//! use obsrisk_worker::migrations;
//!
//! let pool = PgPool::connect(&database_url).await?;
//! migrations::run(&pool).await?;
//! ```

use sqlx::migrate::{MigrateError, Migrator};

/// PostgreSQL migrations embedded at compile time.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run all pending migrations.
///
/// Safe to call multiple times; already-applied migrations are skipped.
pub async fn run(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
