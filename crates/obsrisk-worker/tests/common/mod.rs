// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for obsrisk-worker database tests.

#![allow(dead_code)]

use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};

/// Skip test if database URL is not set
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_OBSRISK_DATABASE_URL").is_err()
            && std::env::var("OBSRISK_DATABASE_URL").is_err()
        {
            eprintln!("Skipping test: TEST_OBSRISK_DATABASE_URL or OBSRISK_DATABASE_URL not set");
            return;
        }
    };
}

/// Serializes tests that touch the shared `jobs` table.
static JOBS_LOCK: Mutex<()> = Mutex::const_new(());

/// Connect to the test database and apply migrations.
pub async fn get_test_pool() -> Option<PgPool> {
    let database_url = std::env::var("TEST_OBSRISK_DATABASE_URL")
        .or_else(|_| std::env::var("OBSRISK_DATABASE_URL"))
        .ok()?;
    let pool = PgPool::connect(&database_url).await.ok()?;
    obsrisk_worker::migrations::run(&pool)
        .await
        .expect("Failed to run migrations");
    Some(pool)
}

/// Unique scope so parallel tests never see each other's rows.
pub fn unique_scope(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}-{}", prefix, std::process::id(), nanos)
}

/// Take the jobs lock and clear every open job left by earlier runs.
pub async fn lock_jobs(pool: &PgPool) -> MutexGuard<'static, ()> {
    let guard = JOBS_LOCK.lock().await;
    sqlx::query("DELETE FROM jobs WHERE status IN ('PENDING', 'RUNNING', 'RETRY')")
        .execute(pool)
        .await
        .expect("Failed to clear open jobs");
    guard
}

/// Look up a meta id by name, e.g. `meta_id(pool, "risk_meta", "risk_id", "risk_name", "High")`.
pub async fn meta_id(
    pool: &PgPool,
    table: &str,
    id_column: &str,
    name_column: &str,
    name: &str,
) -> i32 {
    let query = format!("SELECT {id_column} FROM {table} WHERE {name_column} = $1");
    let (id,): (i32,) = sqlx::query_as(&query)
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("Failed to look up meta id");
    id
}

/// Remove every row belonging to a scope.
pub async fn cleanup_scope(pool: &PgPool, scope: &str) {
    for table in [
        "applications",
        "applications_instances",
        "domain_criticity",
        "maintenance_time_criticity",
        "risk_matrix",
    ] {
        let query = format!("DELETE FROM {table} WHERE scope = $1");
        let _ = sqlx::query(&query).bind(scope).execute(pool).await;
    }
}
