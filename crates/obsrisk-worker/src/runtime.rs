// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for the obsolescence risk worker.
//!
//! [`RiskRuntime`] wires the risk calculator into a job queue, registers it as
//! a worker and starts the cron scheduler, all as background tasks of the
//! current tokio runtime.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use obsrisk_worker::product_client::{HttpProductClient, ProductClientConfig};
//! use obsrisk_worker::runtime::RiskRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = sqlx::PgPool::connect("postgres://...").await?;
//!     let client = Arc::new(HttpProductClient::new(ProductClientConfig::default())?);
//!
//!     let runtime = RiskRuntime::builder()
//!         .pool(pool)
//!         .product_client(client)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     // Compute risks now instead of waiting for the schedule.
//!     runtime.trigger().await?;
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Result;
use obsrisk_core::{
    ProductMaintenanceClient, RiskCalculator, RiskCalculatorConfig, RiskRepository,
};
use sqlx::PgPool;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::{Config, DEFAULT_WORKER_ID};
use crate::queue::{JobQueue, JobStore, PgJobStore, QueueConfig};
use crate::repository::PostgresRiskRepository;
use crate::risk_worker::RiskWorker;
use crate::scheduler::{RiskScheduler, SchedulerConfig};

/// Builder for creating a [`RiskRuntime`].
pub struct RiskRuntimeBuilder {
    repository: Option<Arc<dyn RiskRepository>>,
    job_store: Option<Arc<dyn JobStore>>,
    product_client: Option<Arc<dyn ProductMaintenanceClient>>,
    worker_id: String,
    calculator_config: RiskCalculatorConfig,
    queue_config: QueueConfig,
    scheduler_config: SchedulerConfig,
}

impl Default for RiskRuntimeBuilder {
    fn default() -> Self {
        Self {
            repository: None,
            job_store: None,
            product_client: None,
            worker_id: DEFAULT_WORKER_ID.to_string(),
            calculator_config: RiskCalculatorConfig::default(),
            queue_config: QueueConfig::default(),
            scheduler_config: SchedulerConfig::default(),
        }
    }
}

impl RiskRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use PostgreSQL for both the risk repository and the job store.
    ///
    /// Either can still be overridden with [`repository`](Self::repository)
    /// or [`job_store`](Self::job_store).
    pub fn pool(mut self, pool: PgPool) -> Self {
        if self.repository.is_none() {
            self.repository = Some(Arc::new(PostgresRiskRepository::new(pool.clone())));
        }
        if self.job_store.is_none() {
            self.job_store = Some(Arc::new(PgJobStore::new(pool)));
        }
        self
    }

    /// Set the risk repository (required unless a pool is given).
    pub fn repository(mut self, repository: Arc<dyn RiskRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Set the job store (required unless a pool is given).
    pub fn job_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.job_store = Some(store);
        self
    }

    /// Set the product-licensing client (required).
    pub fn product_client(mut self, client: Arc<dyn ProductMaintenanceClient>) -> Self {
        self.product_client = Some(client);
        self
    }

    /// Apply the worker id and tuning sections of a loaded [`Config`].
    pub fn config(self, config: &Config) -> Self {
        self.worker_id(config.worker_id.clone())
            .calculator_config(config.calculator.clone())
            .queue_config(config.queue.clone())
            .scheduler_config(config.scheduler.clone())
    }

    /// Set the worker identifier, also the type of risk jobs (default: "ob").
    pub fn worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn calculator_config(mut self, config: RiskCalculatorConfig) -> Self {
        self.calculator_config = config;
        self
    }

    pub fn queue_config(mut self, config: QueueConfig) -> Self {
        self.queue_config = config;
        self
    }

    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler_config = config;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<RiskRuntimeConfig> {
        let repository = self
            .repository
            .ok_or_else(|| anyhow::anyhow!("repository is required"))?;
        let job_store = self
            .job_store
            .ok_or_else(|| anyhow::anyhow!("job_store is required"))?;
        let product_client = self
            .product_client
            .ok_or_else(|| anyhow::anyhow!("product_client is required"))?;
        if self.worker_id.trim().is_empty() {
            anyhow::bail!("worker_id must not be empty");
        }

        Ok(RiskRuntimeConfig {
            repository,
            job_store,
            product_client,
            worker_id: self.worker_id,
            calculator_config: self.calculator_config,
            queue_config: self.queue_config,
            scheduler_config: self.scheduler_config,
        })
    }
}

/// Configuration for a [`RiskRuntime`].
pub struct RiskRuntimeConfig {
    repository: Arc<dyn RiskRepository>,
    job_store: Arc<dyn JobStore>,
    product_client: Arc<dyn ProductMaintenanceClient>,
    worker_id: String,
    calculator_config: RiskCalculatorConfig,
    queue_config: QueueConfig,
    scheduler_config: SchedulerConfig,
}

impl RiskRuntimeConfig {
    /// Start the runtime, spawning the job queue and scheduler tasks.
    pub async fn start(self) -> Result<RiskRuntime> {
        let calculator = Arc::new(RiskCalculator::with_config(
            self.repository,
            self.product_client,
            self.calculator_config,
        ));

        let mut queue = JobQueue::new(self.job_store, self.queue_config);
        queue.register_worker(Arc::new(RiskWorker::new(self.worker_id.clone(), calculator)));
        let queue = Arc::new(queue);

        let scheduler =
            RiskScheduler::new(queue.clone(), self.worker_id.clone(), self.scheduler_config)?;
        let scheduler_shutdown = scheduler.shutdown_handle();

        let queue_runner = queue.clone();
        let queue_handle = tokio::spawn(async move {
            queue_runner.run().await;
        });

        let scheduler_handle = tokio::spawn(async move {
            scheduler.run().await;
        });

        info!(worker_id = %self.worker_id, "RiskRuntime started");

        Ok(RiskRuntime {
            queue,
            worker_id: self.worker_id,
            queue_handle,
            scheduler_handle,
            scheduler_shutdown,
        })
    }
}

/// Running risk worker: job queue plus cron scheduler.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct RiskRuntime {
    queue: Arc<JobQueue>,
    worker_id: String,
    queue_handle: JoinHandle<()>,
    scheduler_handle: JoinHandle<()>,
    scheduler_shutdown: Arc<Notify>,
}

impl RiskRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> RiskRuntimeBuilder {
        RiskRuntimeBuilder::new()
    }

    /// Push a risk job now. Returns the job id.
    pub async fn trigger(&self) -> Result<i32> {
        let job_id = self
            .queue
            .push_job(&self.worker_id, serde_json::json!({}))
            .await?;
        info!(job_id = job_id, worker_id = %self.worker_id, "Risk job triggered");
        Ok(job_id)
    }

    /// Gracefully shut down the runtime.
    ///
    /// Stops the scheduler, cancels the running job (which is requeued) and
    /// waits for both tasks to finish.
    pub async fn shutdown(self) -> Result<()> {
        info!("RiskRuntime shutting down...");

        self.scheduler_shutdown.notify_one();
        self.queue.shutdown();

        if let Err(e) = self.scheduler_handle.await {
            error!("Risk scheduler task panicked: {}", e);
        }

        match self.queue_handle.await {
            Ok(()) => {
                info!("RiskRuntime shutdown complete");
                Ok(())
            }
            Err(e) => {
                error!("Job queue task panicked: {}", e);
                Err(anyhow::anyhow!("job queue task panicked: {}", e))
            }
        }
    }

    /// Check if the runtime is still running.
    pub fn is_running(&self) -> bool {
        !self.queue_handle.is_finished()
    }
}
