// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clinic (relationship) service client.

use crate::error::AppError;
use crate::models::ClinicRelationship;
use crate::services::identity::{IdentityClient, SESSION_TOKEN_HEADER};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Source of a user's clinician relationships.
#[async_trait]
pub trait ClinicDirectory: Send + Sync {
    /// At most `limit` relationships for the user. Any non-success response
    /// is an error.
    async fn list_clinic_relationships(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ClinicRelationship>, AppError>;
}

/// HTTP client for the clinic service.
pub struct ClinicServiceClient {
    http: reqwest::Client,
    base_url: String,
    identity: Arc<dyn IdentityClient>,
}

impl ClinicServiceClient {
    pub fn new(
        base_url: &str,
        identity: Arc<dyn IdentityClient>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ClinicService(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            identity,
        })
    }
}

#[async_trait]
impl ClinicDirectory for ClinicServiceClient {
    async fn list_clinic_relationships(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ClinicRelationship>, AppError> {
        let token = self.identity.server_token().await?;
        let url = format!(
            "{}/v1/clinicians/{}/clinics",
            self.base_url,
            urlencoding::encode(user_id)
        );

        let response = self
            .http
            .get(&url)
            .header(SESSION_TOKEN_HEADER, token)
            .query(&[("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| AppError::ClinicService(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(AppError::ClinicService(format!(
                "unexpected status code {} when fetching clinics for user {}",
                response.status().as_u16(),
                user_id
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::ClinicService(format!("JSON parse error: {}", e)))
    }
}
