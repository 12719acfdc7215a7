// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP client for the product-licensing service gateway.
//!
//! Lists the acquired rights of one product through
//! `GET {base_url}/api/v1/product/acqrights`. Requests carry a bearer token,
//! either configured statically or obtained with a password grant and cached
//! until shortly before it expires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use obsrisk_core::{AcquiredRight, ProductMaintenanceClient, RightsQuery, RiskError};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const ACQUIRED_RIGHTS_PATH: &str = "/api/v1/product/acqrights";
const OPERATION: &str = "list_acquired_rights";

/// Tokens are refreshed this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Password-grant credentials for the authentication service.
#[derive(Clone)]
pub struct PasswordGrant {
    /// Token endpoint.
    pub token_url: String,
    /// Service account user.
    pub username: String,
    /// Service account password.
    pub password: String,
}

impl std::fmt::Debug for PasswordGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordGrant")
            .field("token_url", &self.token_url)
            .field("username", &self.username)
            .finish()
    }
}

/// Configuration for [`HttpProductClient`].
#[derive(Clone)]
pub struct ProductClientConfig {
    /// Gateway base URL, e.g. `http://product-service:8080`.
    pub base_url: String,
    /// Static bearer token. Takes precedence over the password grant.
    pub api_token: Option<String>,
    /// Password grant used when no static token is set.
    pub password_grant: Option<PasswordGrant>,
    /// Timeout of each HTTP request.
    pub request_timeout: Duration,
}

impl Default for ProductClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            api_token: None,
            password_grant: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for ProductClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("password_grant", &self.password_grant)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct AcquiredRightsResponse {
    #[serde(default, alias = "acquiredRights")]
    acquired_rights: Vec<AcquiredRightDto>,
}

#[derive(Debug, Deserialize)]
struct AcquiredRightDto {
    #[serde(default, rename = "SKU", alias = "sku")]
    sku: String,
    #[serde(default, alias = "swidTag")]
    swid_tag: String,
    #[serde(default, alias = "endOfMaintenance")]
    end_of_maintenance: Option<DateTime<Utc>>,
}

impl From<AcquiredRightDto> for AcquiredRight {
    fn from(dto: AcquiredRightDto) -> Self {
        Self {
            sku: dto.sku,
            swid_tag: dto.swid_tag,
            end_of_maintenance: dto.end_of_maintenance,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at
            .is_none_or(|at| Instant::now() + TOKEN_EXPIRY_MARGIN < at)
    }
}

/// Product-licensing client over the HTTP/JSON gateway.
pub struct HttpProductClient {
    client: reqwest::Client,
    base_url: String,
    config: ProductClientConfig,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl std::fmt::Debug for HttpProductClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProductClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpProductClient {
    /// Create a client. No request is made until the first lookup.
    pub fn new(config: ProductClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Other("product service URL is empty".to_string()));
        }

        let token = config.api_token.clone().map(|token| CachedToken {
            token,
            expires_at: None,
        });

        Ok(Self {
            client,
            base_url,
            config,
            token: Arc::new(RwLock::new(token)),
        })
    }

    /// Current bearer token, fetching a new one when needed.
    async fn bearer_token(&self) -> std::result::Result<Option<String>, RiskError> {
        if let Some(cached) = self.token.read().await.as_ref()
            && cached.is_fresh()
        {
            return Ok(Some(cached.token.clone()));
        }

        let Some(grant) = &self.config.password_grant else {
            return Ok(None);
        };

        let mut state = self.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = state.as_ref()
            && cached.is_fresh()
        {
            return Ok(Some(cached.token.clone()));
        }

        let fetched = self.fetch_token(grant).await?;
        let token = fetched.token.clone();
        *state = Some(fetched);
        Ok(Some(token))
    }

    async fn fetch_token(
        &self,
        grant: &PasswordGrant,
    ) -> std::result::Result<CachedToken, RiskError> {
        let resp = self
            .client
            .post(&grant.token_url)
            .form(&[
                ("grant_type", "password"),
                ("username", grant.username.as_str()),
                ("password", grant.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| RiskError::product_service("fetch_token", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RiskError::product_service(
                "fetch_token",
                format!("HTTP {status}: {body}"),
            ));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| RiskError::product_service("fetch_token", e))?;

        debug!(expires_in = ?body.expires_in, "Obtained product service token");

        Ok(CachedToken {
            token: body.access_token,
            // Lifetimes past what an Instant can hold never expire.
            expires_at: body
                .expires_in
                .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs))),
        })
    }

    async fn invalidate_token(&self) {
        if self.config.password_grant.is_some() {
            *self.token.write().await = None;
        }
    }
}

#[async_trait]
impl ProductMaintenanceClient for HttpProductClient {
    async fn list_acquired_rights(
        &self,
        query: &RightsQuery,
    ) -> obsrisk_core::Result<Vec<AcquiredRight>> {
        let url = format!("{}{}", self.base_url, ACQUIRED_RIGHTS_PATH);
        let page_num = query.page_num.to_string();
        let page_size = query.page_size.to_string();

        let mut req = self.client.get(&url).query(&[
            ("scopes", query.scope.as_str()),
            ("search_params.swidTag.filteringkey", query.swid_tag.as_str()),
            ("search_params.swidTag.filter_type", "true"),
            ("sort_by", "END_OF_MAINTENANCE"),
            ("sort_order", "asc"),
            ("page_num", page_num.as_str()),
            ("page_size", page_size.as_str()),
        ]);

        if let Some(token) = self.bearer_token().await? {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| RiskError::product_service(OPERATION, e))?;

        match resp.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(RiskError::not_found("acquired rights", &query.swid_tag));
            }
            StatusCode::UNAUTHORIZED => {
                warn!(swid_tag = %query.swid_tag, "Product service rejected the token");
                self.invalidate_token().await;
                return Err(RiskError::product_service(OPERATION, "HTTP 401 Unauthorized"));
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                return Err(RiskError::product_service(
                    OPERATION,
                    format!("HTTP {status}: {body}"),
                ));
            }
        }

        let body: AcquiredRightsResponse = resp
            .json()
            .await
            .map_err(|e| RiskError::product_service(OPERATION, e))?;

        Ok(body
            .acquired_rights
            .into_iter()
            .map(AcquiredRight::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ProductClientConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert!(config.api_token.is_none());
        assert!(config.password_grant.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = ProductClientConfig {
            api_token: Some("top-secret".to_string()),
            password_grant: Some(PasswordGrant {
                token_url: "http://auth/token".to_string(),
                username: "svc".to_string(),
                password: "hunter2".to_string(),
            }),
            ..Default::default()
        };

        let debug = format!("{config:?}");
        assert!(!debug.contains("top-secret"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("svc"));
    }

    #[test]
    fn test_new_rejects_empty_url() {
        let config = ProductClientConfig {
            base_url: "/".to_string(),
            ..Default::default()
        };
        assert!(HttpProductClient::new(config).is_err());
    }

    #[test]
    fn test_response_accepts_gateway_field_names() {
        let body = r#"{
            "totalRecords": 2,
            "acquired_rights": [
                {"SKU": "s1", "swid_tag": "P1", "end_of_maintenance": "2026-05-01T00:00:00Z"},
                {"SKU": "s2", "swidTag": "P1"}
            ]
        }"#;

        let parsed: AcquiredRightsResponse = serde_json::from_str(body).unwrap();
        let rights: Vec<AcquiredRight> = parsed
            .acquired_rights
            .into_iter()
            .map(AcquiredRight::from)
            .collect();

        assert_eq!(rights.len(), 2);
        assert_eq!(rights[0].sku, "s1");
        assert!(rights[0].end_of_maintenance.is_some());
        assert_eq!(rights[1].swid_tag, "P1");
        assert!(rights[1].end_of_maintenance.is_none());
    }

    #[test]
    fn test_cached_token_freshness() {
        let forever = CachedToken {
            token: "t".to_string(),
            expires_at: None,
        };
        assert!(forever.is_fresh());

        let expiring = CachedToken {
            token: "t".to_string(),
            expires_at: Some(Instant::now() + Duration::from_secs(5)),
        };
        assert!(!expiring.is_fresh());
    }
}
