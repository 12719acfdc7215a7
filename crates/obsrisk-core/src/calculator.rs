// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Obsolescence risk calculation.
//!
//! For every application the calculator combines:
//! 1. The criticality of the application's business domain
//! 2. The maintenance level matching the months left before the earliest
//!    maintenance expiry among all products of all its instances
//! 3. The risk matrix cell for that (domain, maintenance) pair
//!
//! and writes the resulting risk level name (or `NULL`) on the application.
//!
//! Applications are processed one after the other. Lookup misses are handled
//! per application; every other collaborator error aborts the whole run so the
//! caller can retry it.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Result, RiskError};
use crate::model::{
    Application, DomainCriticality, Instance, MaintenanceLevel, OVERDUE_MAINTENANCE_LEVEL,
    RightsQuery,
};
use crate::rounding::months_until;
use crate::traits::{ProductMaintenanceClient, RiskRepository};

/// Configuration for the risk calculator.
#[derive(Debug, Clone)]
pub struct RiskCalculatorConfig {
    /// Page size when listing a product's acquired rights. Only the first page is read.
    pub rights_page_size: u32,
}

impl Default for RiskCalculatorConfig {
    fn default() -> Self {
        Self {
            rights_page_size: 50,
        }
    }
}

/// What happened to one application during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationOutcome {
    /// A risk level was written.
    Classified(String),
    /// `NULL` was written (no domain criticality or no risk matrix cell).
    Unclassified,
    /// Nothing was written (no instances or no maintenance expiry).
    Skipped,
}

/// Counters for a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Applications returned by the repository.
    pub applications: usize,
    /// Applications that received a risk level.
    pub classified: usize,
    /// Applications whose risk was cleared.
    pub unclassified: usize,
    /// Applications left untouched.
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &ApplicationOutcome) {
        match outcome {
            ApplicationOutcome::Classified(_) => self.classified += 1,
            ApplicationOutcome::Unclassified => self.unclassified += 1,
            ApplicationOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Computes and stores the obsolescence risk of every application.
pub struct RiskCalculator {
    repository: Arc<dyn RiskRepository>,
    products: Arc<dyn ProductMaintenanceClient>,
    config: RiskCalculatorConfig,
    run_guard: Mutex<()>,
}

impl RiskCalculator {
    /// Create a calculator with the default configuration.
    pub fn new(
        repository: Arc<dyn RiskRepository>,
        products: Arc<dyn ProductMaintenanceClient>,
    ) -> Self {
        Self::with_config(repository, products, RiskCalculatorConfig::default())
    }

    /// Create a calculator with an explicit configuration.
    pub fn with_config(
        repository: Arc<dyn RiskRepository>,
        products: Arc<dyn ProductMaintenanceClient>,
        config: RiskCalculatorConfig,
    ) -> Self {
        Self {
            repository,
            products,
            config,
            run_guard: Mutex::new(()),
        }
    }

    /// Run over all applications, measuring expiry from the current time.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary> {
        self.run_at(Utc::now(), cancel).await
    }

    /// Run over all applications, measuring expiry from `now`.
    ///
    /// Overlapping calls on the same calculator are serialized.
    pub async fn run_at(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let _guard = cancellable(cancel, async { Ok(self.run_guard.lock().await) }).await?;

        let applications =
            match cancellable(cancel, self.repository.get_all_applications()).await {
                Ok(applications) => applications,
                Err(e) if e.is_not_found() => {
                    debug!("No applications to classify");
                    Vec::new()
                }
                Err(e) => {
                    error!(
                        error = %e,
                        operation = "get_all_applications",
                        "Failed to list applications"
                    );
                    return Err(e);
                }
            };

        info!(applications = applications.len(), "Obsolescence risk run started");

        let mut summary = RunSummary {
            applications: applications.len(),
            ..Default::default()
        };

        for app in &applications {
            let outcome = self.classify_application(app, now, cancel).await?;
            debug!(
                application_id = %app.id,
                scope = %app.scope,
                outcome = ?outcome,
                "Application processed"
            );
            summary.record(&outcome);
        }

        info!(
            applications = summary.applications,
            classified = summary.classified,
            unclassified = summary.unclassified,
            skipped = summary.skipped,
            "Obsolescence risk run completed"
        );

        Ok(summary)
    }

    /// Classify one application and store the result.
    async fn classify_application(
        &self,
        app: &Application,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ApplicationOutcome> {
        let domain_criticality = match cancellable(
            cancel,
            self.repository.get_domain_criticality(&app.domain, &app.scope),
        )
        .await
        {
            Ok(criticality) => criticality,
            Err(e) if e.is_not_found() => {
                debug!(
                    application_id = %app.id,
                    scope = %app.scope,
                    domain = %app.domain,
                    "No domain criticality configured, clearing risk"
                );
                self.persist(app, None, cancel).await?;
                return Ok(ApplicationOutcome::Unclassified);
            }
            Err(e) => {
                error!(
                    application_id = %app.id,
                    scope = %app.scope,
                    operation = "get_domain_criticality",
                    error = %e,
                    "Failed to fetch domain criticality"
                );
                return Err(e);
            }
        };

        let instances = match cancellable(
            cancel,
            self.repository.get_application_instances(&app.id, &app.scope),
        )
        .await
        {
            Ok(instances) => instances,
            Err(e) if e.is_not_found() => {
                debug!(
                    application_id = %app.id,
                    scope = %app.scope,
                    "Application has no instances"
                );
                return Ok(ApplicationOutcome::Skipped);
            }
            Err(e) => {
                error!(
                    application_id = %app.id,
                    scope = %app.scope,
                    operation = "get_application_instances",
                    error = %e,
                    "Failed to fetch application instances"
                );
                return Err(e);
            }
        };

        let Some(min_months) = self
            .nearest_expiry_months(app, &instances, now, cancel)
            .await?
        else {
            info!(
                application_id = %app.id,
                application_name = %app.name,
                scope = %app.scope,
                "No end of maintenance found for application"
            );
            return Ok(ApplicationOutcome::Skipped);
        };

        let maintenance_level = self.maintenance_level(app, min_months, cancel).await?;

        let risk = self
            .risk_level_name(app, &domain_criticality, &maintenance_level, cancel)
            .await?;

        self.persist(app, risk.as_deref(), cancel).await?;

        Ok(match risk {
            Some(name) => ApplicationOutcome::Classified(name),
            None => ApplicationOutcome::Unclassified,
        })
    }

    /// Months until the earliest maintenance expiry across all products of all instances.
    ///
    /// Returns `None` when no product has a right with an end of maintenance.
    async fn nearest_expiry_months(
        &self,
        app: &Application,
        instances: &[Instance],
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Option<i64>> {
        let mut min_months: Option<i64> = None;

        for instance in instances {
            for product in &instance.products {
                let query = RightsQuery::earliest_expiry_first(
                    &app.scope,
                    product,
                    self.config.rights_page_size,
                );

                let rights =
                    match cancellable(cancel, self.products.list_acquired_rights(&query)).await {
                        Ok(rights) => rights,
                        Err(e) if e.is_not_found() => continue,
                        Err(e) => {
                            error!(
                                application_id = %app.id,
                                scope = %app.scope,
                                product = %product,
                                operation = "list_acquired_rights",
                                error = %e,
                                "Failed to fetch acquired rights"
                            );
                            return Err(e);
                        }
                    };

                let mut product_min: Option<i64> = None;
                for expiry in rights.iter().filter_map(|right| right.end_of_maintenance) {
                    let months = months_until(expiry, now);
                    if product_min.is_none_or(|current| months < current) {
                        product_min = Some(months);
                    }
                }

                let Some(product_min) = product_min else {
                    debug!(
                        application_id = %app.id,
                        product = %product,
                        "Product has no right with an end of maintenance"
                    );
                    continue;
                };

                if min_months.is_none_or(|current| product_min < current) {
                    min_months = Some(product_min);
                }
            }
        }

        Ok(min_months)
    }

    async fn maintenance_level(
        &self,
        app: &Application,
        min_months: i64,
        cancel: &CancellationToken,
    ) -> Result<MaintenanceLevel> {
        let lookup = if min_months <= 0 {
            cancellable(
                cancel,
                self.repository
                    .get_maintenance_level_by_name(OVERDUE_MAINTENANCE_LEVEL, &app.scope),
            )
            .await
        } else {
            cancellable(
                cancel,
                self.repository
                    .get_maintenance_level_by_month(min_months, &app.scope),
            )
            .await
        };

        lookup.inspect_err(|e| {
            error!(
                application_id = %app.id,
                scope = %app.scope,
                months = min_months,
                operation = "get_maintenance_level",
                error = %e,
                "Failed to fetch maintenance level"
            );
        })
    }

    /// Risk matrix lookup; a missing cell yields `None`.
    async fn risk_level_name(
        &self,
        app: &Application,
        domain_criticality: &DomainCriticality,
        maintenance_level: &MaintenanceLevel,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let lookup = cancellable(
            cancel,
            self.repository.get_risk_level_name(
                domain_criticality.id,
                maintenance_level.id,
                &app.scope,
            ),
        )
        .await;

        match lookup {
            Ok(name) if name.is_empty() => Ok(None),
            Ok(name) => Ok(Some(name)),
            Err(e) if e.is_not_found() => {
                debug!(
                    application_id = %app.id,
                    scope = %app.scope,
                    domain_criticality_id = domain_criticality.id,
                    maintenance_level_id = maintenance_level.id,
                    "No risk matrix entry"
                );
                Ok(None)
            }
            Err(e) => {
                error!(
                    application_id = %app.id,
                    scope = %app.scope,
                    operation = "get_risk_level_name",
                    error = %e,
                    "Failed to fetch risk level"
                );
                Err(e)
            }
        }
    }

    async fn persist(
        &self,
        app: &Application,
        risk: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        cancellable(
            cancel,
            self.repository
                .persist_application_risk(&app.id, &app.scope, risk),
        )
        .await
        .inspect_err(|e| {
            error!(
                application_id = %app.id,
                scope = %app.scope,
                operation = "persist_application_risk",
                error = %e,
                "Failed to store obsolescence risk"
            );
        })
    }
}

/// Await `fut` unless `cancel` fires first.
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(RiskError::Cancelled),
        result = fut => result,
    }
}
