// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory collaborators for testing.
//!
//! [`InMemoryRiskRepository`] and [`MockProductClient`] answer from maps filled
//! through builder methods, record every call, and can be told to fail a given
//! operation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{Result, RiskError};
use crate::model::{
    AcquiredRight, Application, DomainCriticality, Instance, MaintenanceLevel, RightsQuery,
};
use crate::traits::{ProductMaintenanceClient, RiskRepository};

/// A call received by [`InMemoryRiskRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryCall {
    GetAllApplications,
    GetDomainCriticality {
        domain: String,
        scope: String,
    },
    GetApplicationInstances {
        application_id: String,
        scope: String,
    },
    GetMaintenanceLevelByMonth {
        month: i64,
        scope: String,
    },
    GetMaintenanceLevelByName {
        name: String,
        scope: String,
    },
    GetRiskLevelName {
        domain_criticality_id: i32,
        maintenance_level_id: i32,
        scope: String,
    },
    PersistApplicationRisk {
        application_id: String,
        scope: String,
        risk: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct MonthRange {
    start: i64,
    end: i64,
    level: MaintenanceLevel,
}

/// In-memory risk repository.
#[derive(Default)]
pub struct InMemoryRiskRepository {
    /// `None` makes `get_all_applications` return NotFound.
    applications: Option<Vec<Application>>,
    domain_criticalities: HashMap<(String, String), DomainCriticality>,
    instances: HashMap<(String, String), Vec<Instance>>,
    month_ranges: HashMap<String, Vec<MonthRange>>,
    named_levels: HashMap<String, MaintenanceLevel>,
    risk_matrix: HashMap<(i32, i32, String), String>,
    failures: HashMap<&'static str, RiskError>,
    risks: Mutex<HashMap<(String, String), Option<String>>>,
    calls: Mutex<Vec<RepositoryCall>>,
}

impl InMemoryRiskRepository {
    /// Create an empty repository (no applications).
    pub fn new() -> Self {
        Self {
            applications: Some(Vec::new()),
            ..Default::default()
        }
    }

    /// Make `get_all_applications` report NotFound.
    pub fn without_applications(mut self) -> Self {
        self.applications = None;
        self
    }

    pub fn with_application(mut self, application: Application) -> Self {
        self.applications
            .get_or_insert_with(Vec::new)
            .push(application);
        self
    }

    pub fn with_domain_criticality(
        mut self,
        domain: &str,
        scope: &str,
        id: i32,
        name: &str,
    ) -> Self {
        self.domain_criticalities.insert(
            (domain.to_string(), scope.to_string()),
            DomainCriticality {
                id,
                name: name.to_string(),
            },
        );
        self
    }

    /// Register instances for `(application_id, scope)`. Applications without
    /// registered instances report NotFound.
    pub fn with_instances(
        mut self,
        application_id: &str,
        scope: &str,
        instances: Vec<Instance>,
    ) -> Self {
        self.instances
            .entry((application_id.to_string(), scope.to_string()))
            .or_default()
            .extend(instances);
        self
    }

    /// Register a maintenance level for the inclusive month range `[start, end]`.
    pub fn with_month_range(
        mut self,
        scope: &str,
        start: i64,
        end: i64,
        id: i32,
        name: &str,
    ) -> Self {
        self.month_ranges
            .entry(scope.to_string())
            .or_default()
            .push(MonthRange {
                start,
                end,
                level: MaintenanceLevel {
                    id,
                    name: name.to_string(),
                },
            });
        self
    }

    /// Register a maintenance level reachable by name.
    pub fn with_named_level(mut self, name: &str, id: i32) -> Self {
        self.named_levels.insert(
            name.to_string(),
            MaintenanceLevel {
                id,
                name: name.to_string(),
            },
        );
        self
    }

    pub fn with_risk(
        mut self,
        scope: &str,
        domain_criticality_id: i32,
        maintenance_level_id: i32,
        risk: &str,
    ) -> Self {
        self.risk_matrix.insert(
            (domain_criticality_id, maintenance_level_id, scope.to_string()),
            risk.to_string(),
        );
        self
    }

    /// Seed a stored risk value, as left by a previous run.
    pub fn with_stored_risk(
        mut self,
        application_id: &str,
        scope: &str,
        risk: Option<&str>,
    ) -> Self {
        self.risks.get_mut().insert(
            (application_id.to_string(), scope.to_string()),
            risk.map(str::to_string),
        );
        self
    }

    /// Make every call of `operation` (a trait method name) fail with `error`.
    pub fn failing(mut self, operation: &'static str, error: RiskError) -> Self {
        self.failures.insert(operation, error);
        self
    }

    /// Stored risk of an application: `None` if never written, `Some(None)` if cleared.
    pub async fn stored_risk(&self, application_id: &str, scope: &str) -> Option<Option<String>> {
        self.risks
            .lock()
            .await
            .get(&(application_id.to_string(), scope.to_string()))
            .cloned()
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<RepositoryCall> {
        self.calls.lock().await.clone()
    }

    /// Only the persist calls received so far, in order.
    pub async fn persisted(&self) -> Vec<(String, String, Option<String>)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                RepositoryCall::PersistApplicationRisk {
                    application_id,
                    scope,
                    risk,
                } => Some((application_id.clone(), scope.clone(), risk.clone())),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, operation: &'static str, call: RepositoryCall) -> Result<()> {
        self.calls.lock().await.push(call);
        match self.failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RiskRepository for InMemoryRiskRepository {
    async fn get_all_applications(&self) -> Result<Vec<Application>> {
        self.record("get_all_applications", RepositoryCall::GetAllApplications)
            .await?;
        self.applications
            .clone()
            .ok_or_else(|| RiskError::not_found("applications", "*"))
    }

    async fn get_domain_criticality(
        &self,
        domain: &str,
        scope: &str,
    ) -> Result<DomainCriticality> {
        self.record(
            "get_domain_criticality",
            RepositoryCall::GetDomainCriticality {
                domain: domain.to_string(),
                scope: scope.to_string(),
            },
        )
        .await?;
        self.domain_criticalities
            .get(&(domain.to_string(), scope.to_string()))
            .cloned()
            .ok_or_else(|| RiskError::not_found("domain criticality", format!("{domain}/{scope}")))
    }

    async fn get_application_instances(
        &self,
        application_id: &str,
        scope: &str,
    ) -> Result<Vec<Instance>> {
        self.record(
            "get_application_instances",
            RepositoryCall::GetApplicationInstances {
                application_id: application_id.to_string(),
                scope: scope.to_string(),
            },
        )
        .await?;
        self.instances
            .get(&(application_id.to_string(), scope.to_string()))
            .cloned()
            .ok_or_else(|| RiskError::not_found("instances", format!("{application_id}/{scope}")))
    }

    async fn get_maintenance_level_by_month(
        &self,
        month: i64,
        scope: &str,
    ) -> Result<MaintenanceLevel> {
        self.record(
            "get_maintenance_level_by_month",
            RepositoryCall::GetMaintenanceLevelByMonth {
                month,
                scope: scope.to_string(),
            },
        )
        .await?;
        self.month_ranges
            .get(scope)
            .and_then(|ranges| {
                ranges
                    .iter()
                    .find(|range| range.start <= month && month <= range.end)
            })
            .map(|range| range.level.clone())
            .ok_or_else(|| RiskError::not_found("maintenance level", format!("{month}/{scope}")))
    }

    async fn get_maintenance_level_by_name(
        &self,
        name: &str,
        scope: &str,
    ) -> Result<MaintenanceLevel> {
        self.record(
            "get_maintenance_level_by_name",
            RepositoryCall::GetMaintenanceLevelByName {
                name: name.to_string(),
                scope: scope.to_string(),
            },
        )
        .await?;
        self.named_levels
            .get(name)
            .cloned()
            .ok_or_else(|| RiskError::not_found("maintenance level", name))
    }

    async fn get_risk_level_name(
        &self,
        domain_criticality_id: i32,
        maintenance_level_id: i32,
        scope: &str,
    ) -> Result<String> {
        self.record(
            "get_risk_level_name",
            RepositoryCall::GetRiskLevelName {
                domain_criticality_id,
                maintenance_level_id,
                scope: scope.to_string(),
            },
        )
        .await?;
        self.risk_matrix
            .get(&(domain_criticality_id, maintenance_level_id, scope.to_string()))
            .cloned()
            .ok_or_else(|| {
                RiskError::not_found(
                    "risk level",
                    format!("{domain_criticality_id}/{maintenance_level_id}/{scope}"),
                )
            })
    }

    async fn persist_application_risk(
        &self,
        application_id: &str,
        scope: &str,
        risk: Option<&str>,
    ) -> Result<()> {
        self.record(
            "persist_application_risk",
            RepositoryCall::PersistApplicationRisk {
                application_id: application_id.to_string(),
                scope: scope.to_string(),
                risk: risk.map(str::to_string),
            },
        )
        .await?;
        self.risks.lock().await.insert(
            (application_id.to_string(), scope.to_string()),
            risk.map(str::to_string),
        );
        Ok(())
    }
}

/// Mock product-licensing client.
#[derive(Default)]
pub struct MockProductClient {
    rights: HashMap<(String, String), Vec<AcquiredRight>>,
    failures: HashMap<String, RiskError>,
    queries: Mutex<Vec<RightsQuery>>,
    /// Optional delay before answering, to simulate a slow service.
    pub response_delay: Option<Duration>,
}

impl MockProductClient {
    /// Create a client that knows no product (every product is NotFound).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rights(mut self, scope: &str, swid_tag: &str, rights: Vec<AcquiredRight>) -> Self {
        self.rights
            .insert((scope.to_string(), swid_tag.to_string()), rights);
        self
    }

    /// Register one right per expiry date for a product.
    pub fn with_expiries(self, scope: &str, swid_tag: &str, expiries: &[DateTime<Utc>]) -> Self {
        let rights = expiries
            .iter()
            .enumerate()
            .map(|(i, expiry)| AcquiredRight {
                sku: format!("{swid_tag}-sku{}", i + 1),
                swid_tag: swid_tag.to_string(),
                end_of_maintenance: Some(*expiry),
            })
            .collect();
        self.with_rights(scope, swid_tag, rights)
    }

    /// Make every lookup of `swid_tag` fail with `error`.
    pub fn failing_for(mut self, swid_tag: &str, error: RiskError) -> Self {
        self.failures.insert(swid_tag.to_string(), error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.response_delay = Some(delay);
        self
    }

    /// Every query received so far, in order.
    pub async fn queries(&self) -> Vec<RightsQuery> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl ProductMaintenanceClient for MockProductClient {
    async fn list_acquired_rights(&self, query: &RightsQuery) -> Result<Vec<AcquiredRight>> {
        self.queries.lock().await.push(query.clone());

        if let Some(delay) = self.response_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failures.get(&query.swid_tag) {
            return Err(error.clone());
        }

        self.rights
            .get(&(query.scope.clone(), query.swid_tag.clone()))
            .cloned()
            .ok_or_else(|| RiskError::not_found("acquired rights", &query.swid_tag))
    }
}
