// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Records read and written by the risk calculator.

use chrono::{DateTime, Utc};

/// Name of the maintenance level used when maintenance has already expired.
pub const OVERDUE_MAINTENANCE_LEVEL: &str = "Level 4";

/// A tracked application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    /// Identifier, unique within its scope.
    pub id: String,
    /// Display name (only used in logs).
    pub name: String,
    /// Business domain label, e.g. "Payments" or "Not specified".
    pub domain: String,
    /// Tenant partition.
    pub scope: String,
    /// Last computed obsolescence risk, if any.
    pub obsolescence_risk: Option<String>,
}

/// A deployment of an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Instance identifier.
    pub id: String,
    /// Owning application.
    pub application_id: String,
    /// Tenant partition.
    pub scope: String,
    /// Swid tags of the products installed on this instance.
    pub products: Vec<String>,
    /// Equipment identifiers hosting this instance.
    pub equipments: Vec<String>,
}

/// One acquired license right for a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredRight {
    /// Stock keeping unit of the right.
    pub sku: String,
    /// Product swid tag.
    pub swid_tag: String,
    /// End of the maintenance contract. `None` carries no expiry signal.
    pub end_of_maintenance: Option<DateTime<Utc>>,
}

/// Criticality class assigned to a business domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainCriticality {
    pub id: i32,
    pub name: String,
}

/// Maintenance-time criticality level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceLevel {
    pub id: i32,
    pub name: String,
}

/// Parameters for listing the acquired rights of one product.
///
/// Rights are always returned earliest end of maintenance first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RightsQuery {
    /// Tenant partition.
    pub scope: String,
    /// Product swid tag (exact match).
    pub swid_tag: String,
    /// Page size.
    pub page_size: u32,
    /// Page number, starting at 1.
    pub page_num: u32,
}

impl RightsQuery {
    /// First page of a product's rights, earliest expiry first.
    pub fn earliest_expiry_first(
        scope: impl Into<String>,
        swid_tag: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            scope: scope.into(),
            swid_tag: swid_tag.into(),
            page_size,
            page_num: 1,
        }
    }
}
