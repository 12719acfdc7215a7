// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL implementation of [`RiskRepository`].
//!
//! Queries are runtime-checked. A lookup that returns no row maps to
//! [`RiskError::NotFound`]; every other failure maps to [`RiskError::Database`]
//! tagged with the repository operation.

use async_trait::async_trait;
use obsrisk_core::{
    Application, DomainCriticality, Instance, MaintenanceLevel, Result, RiskError, RiskRepository,
};
use sqlx::PgPool;
use tracing::debug;

#[derive(Debug, Clone, sqlx::FromRow)]
struct ApplicationRecord {
    application_id: String,
    application_name: String,
    application_domain: String,
    scope: String,
    obsolescence_risk: Option<String>,
}

impl From<ApplicationRecord> for Application {
    fn from(record: ApplicationRecord) -> Self {
        Self {
            id: record.application_id,
            name: record.application_name,
            domain: record.application_domain,
            scope: record.scope,
            obsolescence_risk: record.obsolescence_risk,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct InstanceRecord {
    instance_id: String,
    application_id: String,
    scope: String,
    products: Vec<String>,
    equipments: Vec<String>,
}

impl From<InstanceRecord> for Instance {
    fn from(record: InstanceRecord) -> Self {
        Self {
            id: record.instance_id,
            application_id: record.application_id,
            scope: record.scope,
            products: record.products,
            equipments: record.equipments,
        }
    }
}

/// Risk repository backed by the application-service tables.
#[derive(Clone)]
pub struct PostgresRiskRepository {
    pool: PgPool,
}

impl PostgresRiskRepository {
    /// Create a repository over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> RiskError {
    move |e| RiskError::database(operation, e)
}

#[async_trait]
impl RiskRepository for PostgresRiskRepository {
    async fn get_all_applications(&self) -> Result<Vec<Application>> {
        let records = sqlx::query_as::<_, ApplicationRecord>(
            r#"
            SELECT application_id, application_name, application_domain, scope, obsolescence_risk
            FROM applications
            ORDER BY scope, application_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("get_all_applications"))?;

        Ok(records.into_iter().map(Application::from).collect())
    }

    async fn get_domain_criticality(
        &self,
        domain: &str,
        scope: &str,
    ) -> Result<DomainCriticality> {
        let row: Option<(i32, String)> = sqlx::query_as(
            r#"
            SELECT dcm.domain_critic_id, dcm.domain_critic_name
            FROM domain_criticity dc
            JOIN domain_criticity_meta dcm ON dc.domain_critic_id = dcm.domain_critic_id
            WHERE dc.scope = $2 AND $1 = ANY(dc.domains)
            ORDER BY dc.critic_id
            LIMIT 1
            "#,
        )
        .bind(domain)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get_domain_criticality"))?;

        let (id, name) = row.ok_or_else(|| {
            RiskError::not_found("domain criticality", format!("{domain}/{scope}"))
        })?;
        Ok(DomainCriticality { id, name })
    }

    async fn get_application_instances(
        &self,
        application_id: &str,
        scope: &str,
    ) -> Result<Vec<Instance>> {
        let records = sqlx::query_as::<_, InstanceRecord>(
            r#"
            SELECT instance_id, application_id, scope, products, equipments
            FROM applications_instances
            WHERE application_id = $1 AND scope = $2
            ORDER BY instance_id
            "#,
        )
        .bind(application_id)
        .bind(scope)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("get_application_instances"))?;

        if records.is_empty() {
            return Err(RiskError::not_found(
                "instances",
                format!("{application_id}/{scope}"),
            ));
        }

        Ok(records.into_iter().map(Instance::from).collect())
    }

    async fn get_maintenance_level_by_month(
        &self,
        month: i64,
        scope: &str,
    ) -> Result<MaintenanceLevel> {
        let row: Option<(i32, String)> = sqlx::query_as(
            r#"
            SELECT mlm.maintenance_level_id, mlm.maintenance_level_name
            FROM maintenance_time_criticity mtc
            JOIN maintenance_level_meta mlm ON mtc.level_id = mlm.maintenance_level_id
            WHERE mtc.scope = $2 AND $1::BIGINT BETWEEN mtc.start_month AND mtc.end_month
            ORDER BY mtc.start_month
            LIMIT 1
            "#,
        )
        .bind(month)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get_maintenance_level_by_month"))?;

        let (id, name) = row.ok_or_else(|| {
            RiskError::not_found("maintenance level", format!("{month}/{scope}"))
        })?;
        Ok(MaintenanceLevel { id, name })
    }

    async fn get_maintenance_level_by_name(
        &self,
        name: &str,
        scope: &str,
    ) -> Result<MaintenanceLevel> {
        // Level names are global; scope only qualifies the log line.
        debug!(level = name, scope = scope, "Looking up maintenance level by name");

        let row: Option<(i32, String)> = sqlx::query_as(
            r#"
            SELECT maintenance_level_id, maintenance_level_name
            FROM maintenance_level_meta
            WHERE maintenance_level_name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get_maintenance_level_by_name"))?;

        let (id, level_name) =
            row.ok_or_else(|| RiskError::not_found("maintenance level", name))?;
        Ok(MaintenanceLevel {
            id,
            name: level_name,
        })
    }

    async fn get_risk_level_name(
        &self,
        domain_criticality_id: i32,
        maintenance_level_id: i32,
        scope: &str,
    ) -> Result<String> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT rm.risk_name
            FROM risk_matrix_config rmc
            JOIN risk_matrix r ON rmc.configuration_id = r.configuration_id
            JOIN risk_meta rm ON rmc.risk_id = rm.risk_id
            WHERE r.scope = $3
              AND rmc.domain_critic_id = $1
              AND rmc.maintenance_level_id = $2
            "#,
        )
        .bind(domain_criticality_id)
        .bind(maintenance_level_id)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get_risk_level_name"))?;

        row.map(|(name,)| name).ok_or_else(|| {
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
        let result = sqlx::query(
            r#"
            UPDATE applications
            SET obsolescence_risk = $3
            WHERE application_id = $1 AND scope = $2
            "#,
        )
        .bind(application_id)
        .bind(scope)
        .bind(risk)
        .execute(&self.pool)
        .await
        .map_err(db_error("persist_application_risk"))?;

        if result.rows_affected() == 0 {
            debug!(
                application_id = application_id,
                scope = scope,
                "Application disappeared before its risk was stored"
            );
        }

        Ok(())
    }
}
