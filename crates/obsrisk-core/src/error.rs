// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for obsrisk-core.
//!
//! Collaborators report "no matching row" as [`RiskError::NotFound`] so the
//! calculator can tell a skippable lookup miss apart from a failure that must
//! abort the run.

use thiserror::Error;

/// Result type using RiskError.
pub type Result<T> = std::result::Result<T, RiskError>;

/// Errors raised by the risk collaborators and the calculator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RiskError {
    /// The lookup matched nothing.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of record that was looked up (e.g. "domain criticality").
        entity: &'static str,
        /// Lookup key, for logs.
        key: String,
    },

    /// A repository operation failed.
    #[error("Database error during '{operation}': {details}")]
    Database {
        /// The repository operation that failed.
        operation: &'static str,
        /// Error details.
        details: String,
    },

    /// A call to the product-licensing service failed.
    #[error("Product service error during '{operation}': {details}")]
    ProductService {
        /// The client operation that failed.
        operation: &'static str,
        /// Error details.
        details: String,
    },

    /// The run was cancelled before it finished.
    #[error("Risk calculation cancelled")]
    Cancelled,
}

impl RiskError {
    /// Build a [`RiskError::NotFound`].
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Build a [`RiskError::Database`].
    pub fn database(operation: &'static str, details: impl ToString) -> Self {
        Self::Database {
            operation,
            details: details.to_string(),
        }
    }

    /// Build a [`RiskError::ProductService`].
    pub fn product_service(operation: &'static str, details: impl ToString) -> Self {
        Self::ProductService {
            operation,
            details: details.to_string(),
        }
    }

    /// Whether this error only means the lookup matched nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RiskError::not_found("domain criticality", "Payments/OFR");
        assert_eq!(err.to_string(), "domain criticality not found: Payments/OFR");

        let err = RiskError::database("get_all_applications", "connection refused");
        assert_eq!(
            err.to_string(),
            "Database error during 'get_all_applications': connection refused"
        );

        let err = RiskError::product_service("list_acquired_rights", "503 Service Unavailable");
        assert_eq!(
            err.to_string(),
            "Product service error during 'list_acquired_rights': 503 Service Unavailable"
        );

        assert_eq!(RiskError::Cancelled.to_string(), "Risk calculation cancelled");
    }

    #[test]
    fn test_is_not_found() {
        assert!(RiskError::not_found("instances", "app1").is_not_found());
        assert!(!RiskError::database("persist_application_risk", "timeout").is_not_found());
        assert!(!RiskError::Cancelled.is_not_found());
    }
}
