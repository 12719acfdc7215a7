// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Obsrisk Core - Obsolescence Risk Engine
//!
//! This crate classifies every tracked application into an obsolescence risk
//! level. It owns no storage and no transport: applications, configuration and
//! results live behind [`RiskRepository`], and license rights come from the
//! product-licensing service behind [`ProductMaintenanceClient`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                 obsrisk-worker (job queue adapter)                │
//! └──────────────────────────────────────────────────────────────────┘
//!                                 │ run(cancel)
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    RiskCalculator (this crate)                    │
//! │  ┌──────────────┐  ┌────────────────┐  ┌────────────────────┐    │
//! │  │   Domain     │  │  Maintenance   │  │    Risk matrix     │    │
//! │  │ criticality  │  │ expiry (months)│  │      lookup        │    │
//! │  └──────────────┘  └────────────────┘  └────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//!            │                      │
//!            ▼                      ▼
//! ┌──────────────────────┐  ┌──────────────────────────────┐
//! │    RiskRepository    │  │   ProductMaintenanceClient   │
//! │ (applications, meta) │  │      (acquired rights)       │
//! └──────────────────────┘  └──────────────────────────────┘
//! ```
//!
//! # Classification
//!
//! | Step | Lookup | On "not found" |
//! |------|--------|----------------|
//! | 1 | Domain criticality of `(domain, scope)` | store `NULL`, next application |
//! | 2 | Instances of the application | leave untouched, next application |
//! | 3 | Acquired rights of each product, earliest expiry first | ignore the product |
//! | 4 | Maintenance level by month, or `"Level 4"` once expired | abort the run |
//! | 5 | Risk matrix cell | store `NULL` |
//!
//! Months until expiry use an average month of 30.44 days, rounded half away
//! from zero. Any other collaborator error aborts the run with the error so the
//! caller can retry it.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use obsrisk_core::RiskCalculator;
//! use tokio_util::sync::CancellationToken;
//!
//! let calculator = RiskCalculator::new(repository, product_client);
//! let summary = calculator.run(&CancellationToken::new()).await?;
//! println!("{} applications classified", summary.classified);
//! ```

pub mod calculator;
pub mod error;
pub mod mock;
pub mod model;
pub mod rounding;
pub mod traits;

pub use calculator::{ApplicationOutcome, RiskCalculator, RiskCalculatorConfig, RunSummary};
pub use error::{Result, RiskError};
pub use model::{
    AcquiredRight, Application, DomainCriticality, Instance, MaintenanceLevel,
    OVERDUE_MAINTENANCE_LEVEL, RightsQuery,
};
pub use traits::{ProductMaintenanceClient, RiskRepository};
