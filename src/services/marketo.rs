// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketo REST client for lead lookup and upsert.
//!
//! Handles:
//! - OAuth client-credentials access tokens (cached until near expiry)
//! - Lead lookup by email
//! - Create-only / update-only lead requests
//! - Token repair when Marketo reports the access token invalid or expired

use crate::config::MarketoConfig;
use crate::error::AppError;
use crate::models::lead::{describe_errors, CrmResponse};
use crate::models::{LeadLookup, LeadRecord, RecordResult, UpsertRequest};
use crate::services::token::TokenSlot;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const LEADS_PATH: &str = "/rest/v1/leads.json";
const TOKEN_PATH: &str = "/identity/oauth/token";

/// Marketo error codes for an invalid (601) or expired (602) access token.
const ACCESS_TOKEN_ERROR_CODES: [&str; 2] = ["601", "602"];

/// Capabilities the sync engine needs from the CRM.
///
/// Implementations are shared across concurrent syncs and must be safe for
/// concurrent use.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Exact-match lookup of leads by email.
    async fn find_lead(&self, email: &str) -> Result<LeadLookup, AppError>;

    /// Submit a create-only or update-only request.
    async fn upsert(&self, request: &UpsertRequest) -> Result<Vec<RecordResult>, AppError>;

    /// Whether the client can currently talk to the CRM, repairing the
    /// connection once if it cannot.
    async fn is_available(&self) -> bool;
}

/// OAuth token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds until expiry
    expires_in: i64,
}

/// Marketo API client.
pub struct MarketoClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: TokenSlot,
}

impl MarketoClient {
    /// Create a client from validated Marketo settings.
    pub fn new(config: &MarketoConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Crm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            client_id: config.id.clone(),
            client_secret: config.secret.clone(),
            token: TokenSlot::new(),
        })
    }

    async fn access_token(&self) -> Result<String, AppError> {
        self.token.get_or_fetch(|| self.fetch_token()).await
    }

    async fn fetch_token(&self) -> Result<(String, chrono::DateTime<Utc>), AppError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, TOKEN_PATH))
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Crm(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Marketo authentication failed");
            return Err(AppError::Crm(format!(
                "Authentication failed with status {}",
                status
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Crm(format!("Failed to parse token response: {}", e)))?;

        let lifetime = Duration::try_seconds(token.expires_in).ok_or_else(|| {
            AppError::Crm(format!("Token lifetime out of range: {}", token.expires_in))
        })?;

        tracing::debug!(expires_in = token.expires_in, "Marketo access token issued");
        Ok((token.access_token, Utc::now() + lifetime))
    }

    /// Check HTTP status and Marketo's `success` flag, returning `result`.
    async fn check_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<Vec<T>, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                self.token.invalidate().await;
            }
            return Err(AppError::Crm(format!("HTTP {}: {}", status, body)));
        }

        let body: CrmResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::Crm(format!("JSON parse error: {}", e)))?;

        if !body.success {
            if body
                .errors
                .iter()
                .any(|e| ACCESS_TOKEN_ERROR_CODES.contains(&e.code.as_str()))
            {
                tracing::warn!("Marketo access token rejected, dropping cached token");
                self.token.invalidate().await;
            }
            return Err(AppError::Crm(format!(
                "issue with request: {}",
                describe_errors(&body.errors)
            )));
        }

        Ok(body.result)
    }
}

#[async_trait]
impl CrmClient for MarketoClient {
    async fn find_lead(&self, email: &str) -> Result<LeadLookup, AppError> {
        let access_token = self.access_token().await?;

        let response = self
            .http
            .get(format!("{}{}", self.base_url, LEADS_PATH))
            .bearer_auth(access_token)
            .query(&[
                ("filterType", "email"),
                ("filterValues", email),
                ("fields", "email,id"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Crm(format!("could not find a lead: {}", e)))?;

        let leads: Vec<LeadRecord> = self.check_response(response).await?;
        Ok(LeadLookup::from_results(leads))
    }

    async fn upsert(&self, request: &UpsertRequest) -> Result<Vec<RecordResult>, AppError> {
        let access_token = self.access_token().await?;

        let response = self
            .http
            .post(format!("{}{}", self.base_url, LEADS_PATH))
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Crm(format!("could not get a response: {}", e)))?;

        self.check_response(response).await
    }

    async fn is_available(&self) -> bool {
        if self.token.is_valid().await {
            return true;
        }
        // Repair: log in again.
        match self.access_token().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Marketo is not available");
                false
            }
        }
    }
}
