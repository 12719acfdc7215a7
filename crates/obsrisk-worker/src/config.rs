// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::str::FromStr;
use std::time::Duration;

use obsrisk_core::RiskCalculatorConfig;

use crate::product_client::{PasswordGrant, ProductClientConfig};
use crate::queue::QueueConfig;
use crate::scheduler::SchedulerConfig;

/// Worker identifier the risk job is pushed and registered under.
pub const DEFAULT_WORKER_ID: &str = "ob";

/// Obsrisk worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum connections in the pool
    pub db_max_connections: u32,
    /// Worker identifier, also the job type of risk jobs
    pub worker_id: String,
    /// Product-licensing gateway client
    pub product: ProductClientConfig,
    /// Risk calculator tuning
    pub calculator: RiskCalculatorConfig,
    /// Cron trigger
    pub scheduler: SchedulerConfig,
    /// Job queue polling and retries
    pub queue: QueueConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `OBSRISK_DATABASE_URL` (or `DATABASE_URL`): PostgreSQL connection string
    ///
    /// Optional (with defaults):
    /// - `OBSRISK_DB_MAX_CONNECTIONS`: pool size (default: 10)
    /// - `OBSRISK_WORKER_ID`: worker identifier (default: "ob")
    /// - `OBSRISK_PRODUCT_SERVICE_URL`: product gateway (default: http://127.0.0.1:8080)
    /// - `OBSRISK_PRODUCT_API_TOKEN`: static bearer token
    /// - `OBSRISK_AUTH_URL`, `OBSRISK_AUTH_USERNAME`, `OBSRISK_AUTH_PASSWORD`: password grant
    /// - `OBSRISK_REQUEST_TIMEOUT_MS`: HTTP timeout (default: 30000)
    /// - `OBSRISK_RIGHTS_PAGE_SIZE`: acquired rights page size (default: 50)
    /// - `OBSRISK_CRON`: risk job schedule (default: "0 0 * * *")
    /// - `OBSRISK_SCHEDULER_ENABLED`: "true" or "1" to enable (default: true)
    /// - `OBSRISK_RUN_ON_STARTUP`: "true" or "1" to push a job on start (default: false)
    /// - `OBSRISK_QUEUE_POLL_INTERVAL_MS`: queue poll rate (default: 100)
    /// - `OBSRISK_QUEUE_RETRIES`: retries per job (default: 3)
    /// - `OBSRISK_QUEUE_BASE_DELAY_MS`: retry backoff base (default: 3000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("OBSRISK_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| ConfigError::Missing("OBSRISK_DATABASE_URL or DATABASE_URL"))?;

        let db_max_connections = parse_var(
            "OBSRISK_DB_MAX_CONNECTIONS",
            10u32,
            "must be a positive integer",
        )?;

        let worker_id =
            std::env::var("OBSRISK_WORKER_ID").unwrap_or_else(|_| DEFAULT_WORKER_ID.to_string());
        if worker_id.trim().is_empty() {
            return Err(ConfigError::Invalid("OBSRISK_WORKER_ID", "must not be empty"));
        }

        let product = Self::product_from_env()?;

        let calculator = RiskCalculatorConfig {
            rights_page_size: parse_var(
                "OBSRISK_RIGHTS_PAGE_SIZE",
                RiskCalculatorConfig::default().rights_page_size,
                "must be a positive integer",
            )?,
        };
        if calculator.rights_page_size == 0 {
            return Err(ConfigError::Invalid(
                "OBSRISK_RIGHTS_PAGE_SIZE",
                "must be a positive integer",
            ));
        }

        let scheduler_defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            enabled: bool_var("OBSRISK_SCHEDULER_ENABLED", scheduler_defaults.enabled),
            cron: std::env::var("OBSRISK_CRON").unwrap_or(scheduler_defaults.cron),
            run_on_startup: bool_var("OBSRISK_RUN_ON_STARTUP", scheduler_defaults.run_on_startup),
        };

        let queue_defaults = QueueConfig::default();
        let queue = QueueConfig {
            poll_interval: Duration::from_millis(parse_var(
                "OBSRISK_QUEUE_POLL_INTERVAL_MS",
                queue_defaults.poll_interval.as_millis() as u64,
                "must be a number of milliseconds",
            )?),
            retries: parse_var(
                "OBSRISK_QUEUE_RETRIES",
                queue_defaults.retries,
                "must be a non-negative integer",
            )?,
            base_delay: Duration::from_millis(parse_var(
                "OBSRISK_QUEUE_BASE_DELAY_MS",
                queue_defaults.base_delay.as_millis() as u64,
                "must be a number of milliseconds",
            )?),
        };

        Ok(Self {
            database_url,
            db_max_connections,
            worker_id,
            product,
            calculator,
            scheduler,
            queue,
        })
    }

    fn product_from_env() -> Result<ProductClientConfig, ConfigError> {
        let defaults = ProductClientConfig::default();

        let base_url = std::env::var("OBSRISK_PRODUCT_SERVICE_URL").unwrap_or(defaults.base_url);

        let api_token = std::env::var("OBSRISK_PRODUCT_API_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let password_grant = match std::env::var("OBSRISK_AUTH_URL").ok() {
            Some(token_url) if !token_url.is_empty() => Some(PasswordGrant {
                token_url,
                username: std::env::var("OBSRISK_AUTH_USERNAME")
                    .map_err(|_| ConfigError::Missing("OBSRISK_AUTH_USERNAME"))?,
                password: std::env::var("OBSRISK_AUTH_PASSWORD")
                    .map_err(|_| ConfigError::Missing("OBSRISK_AUTH_PASSWORD"))?,
            }),
            _ => None,
        };

        let request_timeout = Duration::from_millis(parse_var(
            "OBSRISK_REQUEST_TIMEOUT_MS",
            defaults.request_timeout.as_millis() as u64,
            "must be a number of milliseconds",
        )?);

        Ok(ProductClientConfig {
            base_url,
            api_token,
            password_grant,
            request_timeout,
        })
    }
}

fn parse_var<T: FromStr>(
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, expected)),
        Err(_) => Ok(default),
    }
}

fn bool_var(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Serializes tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "OBSRISK_DATABASE_URL",
        "DATABASE_URL",
        "OBSRISK_DB_MAX_CONNECTIONS",
        "OBSRISK_WORKER_ID",
        "OBSRISK_PRODUCT_SERVICE_URL",
        "OBSRISK_PRODUCT_API_TOKEN",
        "OBSRISK_AUTH_URL",
        "OBSRISK_AUTH_USERNAME",
        "OBSRISK_AUTH_PASSWORD",
        "OBSRISK_REQUEST_TIMEOUT_MS",
        "OBSRISK_RIGHTS_PAGE_SIZE",
        "OBSRISK_CRON",
        "OBSRISK_SCHEDULER_ENABLED",
        "OBSRISK_RUN_ON_STARTUP",
        "OBSRISK_QUEUE_POLL_INTERVAL_MS",
        "OBSRISK_QUEUE_RETRIES",
        "OBSRISK_QUEUE_BASE_DELAY_MS",
    ];

    /// Sets env vars for a test and restores them on drop
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        /// Start from a clean slate: every variable read by `Config` is removed.
        fn clean() -> Self {
            let mut guard = Self { vars: Vec::new() };
            for key in ALL_VARS {
                guard.remove(key);
            }
            guard
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();
        guard.set("OBSRISK_DATABASE_URL", "postgres://localhost/obsrisk");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "postgres://localhost/obsrisk");
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.worker_id, "ob");
        assert_eq!(config.product.base_url, "http://127.0.0.1:8080");
        assert!(config.product.api_token.is_none());
        assert!(config.product.password_grant.is_none());
        assert_eq!(config.product.request_timeout, Duration::from_secs(30));
        assert_eq!(config.calculator.rights_page_size, 50);
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.cron, "0 0 * * *");
        assert!(!config.scheduler.run_on_startup);
        assert_eq!(config.queue.poll_interval, Duration::from_millis(100));
        assert_eq!(config.queue.retries, 3);
        assert_eq!(config.queue.base_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_config_database_url_fallback() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();
        guard.set("DATABASE_URL", "postgres://fallback/db");

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_url, "postgres://fallback/db");
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::clean();

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
        assert!(err.to_string().contains("OBSRISK_DATABASE_URL"));
    }

    #[test]
    fn test_config_all_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();
        guard.set("OBSRISK_DATABASE_URL", "postgres://user:pass@db:5432/prod");
        guard.set("OBSRISK_DB_MAX_CONNECTIONS", "4");
        guard.set("OBSRISK_WORKER_ID", "obsolescence");
        guard.set("OBSRISK_PRODUCT_SERVICE_URL", "http://product:8090");
        guard.set("OBSRISK_PRODUCT_API_TOKEN", "secret");
        guard.set("OBSRISK_REQUEST_TIMEOUT_MS", "1500");
        guard.set("OBSRISK_RIGHTS_PAGE_SIZE", "20");
        guard.set("OBSRISK_CRON", "*/5 * * * *");
        guard.set("OBSRISK_SCHEDULER_ENABLED", "false");
        guard.set("OBSRISK_RUN_ON_STARTUP", "1");
        guard.set("OBSRISK_QUEUE_POLL_INTERVAL_MS", "250");
        guard.set("OBSRISK_QUEUE_RETRIES", "0");
        guard.set("OBSRISK_QUEUE_BASE_DELAY_MS", "10");

        let config = Config::from_env().unwrap();

        assert_eq!(config.db_max_connections, 4);
        assert_eq!(config.worker_id, "obsolescence");
        assert_eq!(config.product.base_url, "http://product:8090");
        assert_eq!(config.product.api_token.as_deref(), Some("secret"));
        assert_eq!(config.product.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.calculator.rights_page_size, 20);
        assert_eq!(config.scheduler.cron, "*/5 * * * *");
        assert!(!config.scheduler.enabled);
        assert!(config.scheduler.run_on_startup);
        assert_eq!(config.queue.poll_interval, Duration::from_millis(250));
        assert_eq!(config.queue.retries, 0);
        assert_eq!(config.queue.base_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_config_password_grant() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();
        guard.set("OBSRISK_DATABASE_URL", "postgres://localhost/obsrisk");
        guard.set("OBSRISK_AUTH_URL", "http://auth:8080/api/v1/token");
        guard.set("OBSRISK_AUTH_USERNAME", "worker@test.com");
        guard.set("OBSRISK_AUTH_PASSWORD", "pw");

        let config = Config::from_env().unwrap();
        let grant = config.product.password_grant.unwrap();
        assert_eq!(grant.token_url, "http://auth:8080/api/v1/token");
        assert_eq!(grant.username, "worker@test.com");
        assert_eq!(grant.password, "pw");
    }

    #[test]
    fn test_config_password_grant_requires_credentials() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();
        guard.set("OBSRISK_DATABASE_URL", "postgres://localhost/obsrisk");
        guard.set("OBSRISK_AUTH_URL", "http://auth:8080/api/v1/token");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("OBSRISK_AUTH_USERNAME")));
    }

    #[test]
    fn test_config_invalid_values() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();
        guard.set("OBSRISK_DATABASE_URL", "postgres://localhost/obsrisk");
        guard.set("OBSRISK_QUEUE_RETRIES", "many");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("OBSRISK_QUEUE_RETRIES", _)));

        guard.set("OBSRISK_QUEUE_RETRIES", "3");
        guard.set("OBSRISK_RIGHTS_PAGE_SIZE", "0");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("OBSRISK_RIGHTS_PAGE_SIZE", _)));

        guard.set("OBSRISK_RIGHTS_PAGE_SIZE", "50");
        guard.set("OBSRISK_WORKER_ID", "  ");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("OBSRISK_WORKER_ID", _)));
    }
}
