// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Obsolescence risk worker
//!
//! A background service responsible for:
//! - Applying the application and job queue schema
//! - Pushing a risk job on the configured cron schedule
//! - Classifying every application's obsolescence risk when a job runs

use std::sync::Arc;
use tracing::{info, warn};

use obsrisk_worker::config::Config;
use obsrisk_worker::migrations;
use obsrisk_worker::product_client::HttpProductClient;
use obsrisk_worker::runtime::RiskRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "obsrisk_worker=info,obsrisk_core=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        worker_id = %config.worker_id,
        product_service = %config.product.base_url,
        cron = %config.scheduler.cron,
        scheduler_enabled = config.scheduler.enabled,
        "Starting obsolescence risk worker"
    );

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    info!("Connected to database");

    migrations::run(&pool).await?;

    info!("Database migrations applied");

    let product_client = Arc::new(HttpProductClient::new(config.product.clone())?);

    let runtime = RiskRuntime::builder()
        .pool(pool)
        .product_client(product_client)
        .config(&config)
        .build()?
        .start()
        .await?;

    info!("Obsolescence risk worker ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    runtime.shutdown().await?;

    info!("Obsolescence risk worker shut down");

    Ok(())
}
