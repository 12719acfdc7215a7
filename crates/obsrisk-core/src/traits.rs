// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Collaborator trait definitions.
//!
//! The calculator only talks to storage and to the product-licensing service
//! through these traits. Implementations must be safe to share across tasks.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    AcquiredRight, Application, DomainCriticality, Instance, MaintenanceLevel, RightsQuery,
};

/// Storage of applications and of the obsolescence configuration of each scope.
///
/// Lookups that match nothing return [`RiskError::NotFound`](crate::RiskError::NotFound).
#[async_trait]
pub trait RiskRepository: Send + Sync {
    /// All tracked applications across every scope.
    async fn get_all_applications(&self) -> Result<Vec<Application>>;

    /// Criticality configured for a domain label in a scope.
    async fn get_domain_criticality(&self, domain: &str, scope: &str)
    -> Result<DomainCriticality>;

    /// Instances of an application, with their product swid tags.
    async fn get_application_instances(
        &self,
        application_id: &str,
        scope: &str,
    ) -> Result<Vec<Instance>>;

    /// Maintenance level whose inclusive month range contains `month`.
    async fn get_maintenance_level_by_month(
        &self,
        month: i64,
        scope: &str,
    ) -> Result<MaintenanceLevel>;

    /// Maintenance level by name.
    async fn get_maintenance_level_by_name(
        &self,
        name: &str,
        scope: &str,
    ) -> Result<MaintenanceLevel>;

    /// Risk level name of a risk matrix cell.
    async fn get_risk_level_name(
        &self,
        domain_criticality_id: i32,
        maintenance_level_id: i32,
        scope: &str,
    ) -> Result<String>;

    /// Store the risk of an application. `None` clears it.
    async fn persist_application_risk(
        &self,
        application_id: &str,
        scope: &str,
        risk: Option<&str>,
    ) -> Result<()>;
}

/// Client of the product-licensing service.
#[async_trait]
pub trait ProductMaintenanceClient: Send + Sync {
    /// Acquired rights of one product, sorted by end of maintenance.
    async fn list_acquired_rights(&self, query: &RightsQuery) -> Result<Vec<AcquiredRight>>;
}
