// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity service (shoreline) client.
//!
//! Handles:
//! - Server login and session token caching
//! - User lookup (absent users are `None`, not errors)
//! - Session token checks for the refresh endpoint

use crate::error::AppError;
use crate::models::{TokenData, UserData};
use crate::services::token::TokenSlot;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::time::Duration as StdDuration;

/// Header carrying session tokens on every identity-aware service.
pub const SESSION_TOKEN_HEADER: &str = "x-tidepool-session-token";
const SERVER_NAME_HEADER: &str = "x-tidepool-server-name";
const SERVER_SECRET_HEADER: &str = "x-tidepool-server-secret";

/// Server tokens are reissued well before the identity service expires them.
const SERVER_TOKEN_LIFETIME_SECS: i64 = 30 * 60;

/// Identity lookups used by the sync engine and the HTTP layer.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Current user record, or `None` if the user no longer exists.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserData>, AppError>;

    /// Validate a caller's session token. `None` means the token is invalid.
    async fn check_token(&self, token: &str) -> Result<Option<TokenData>, AppError>;

    /// Session token this service authenticates to other services with.
    async fn server_token(&self) -> Result<String, AppError>;
}

/// HTTP client for shoreline.
pub struct ShorelineClient {
    http: reqwest::Client,
    base_url: String,
    server_name: String,
    server_secret: String,
    token: TokenSlot,
}

impl ShorelineClient {
    pub fn new(
        base_url: &str,
        server_name: String,
        server_secret: String,
        timeout: StdDuration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Identity(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            server_name,
            server_secret,
            token: TokenSlot::new(),
        })
    }

    async fn login(&self) -> Result<(String, chrono::DateTime<Utc>), AppError> {
        let response = self
            .http
            .post(format!("{}/serverlogin", self.base_url))
            .header(SERVER_NAME_HEADER, &self.server_name)
            .header(SERVER_SECRET_HEADER, &self.server_secret)
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("Server login request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "Identity server login failed");
            return Err(AppError::Identity(format!(
                "Server login failed with status {}",
                status
            )));
        }

        let token = response
            .headers()
            .get(SESSION_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Identity("Server login returned no session token".into()))?
            .to_string();

        tracing::info!(server_name = %self.server_name, "Logged in to identity service");
        Ok((token, Utc::now() + Duration::seconds(SERVER_TOKEN_LIFETIME_SECS)))
    }
}

#[async_trait]
impl IdentityClient for ShorelineClient {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserData>, AppError> {
        let token = self.server_token().await?;
        let url = format!("{}/user/{}", self.base_url, urlencoding::encode(user_id));

        let response = self
            .http
            .get(&url)
            .header(SESSION_TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|e| AppError::Identity(e.to_string()))?;

        match response.status().as_u16() {
            200 => response
                .json()
                .await
                .map(Some)
                .map_err(|e| AppError::Identity(format!("JSON parse error: {}", e))),
            404 => Ok(None),
            401 => {
                self.token.invalidate().await;
                Err(AppError::Identity(format!(
                    "Server token rejected fetching user {}",
                    user_id
                )))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Identity(format!(
                    "HTTP {} fetching user {}: {}",
                    status, user_id, body
                )))
            }
        }
    }

    async fn check_token(&self, token: &str) -> Result<Option<TokenData>, AppError> {
        let server_token = self.server_token().await?;
        let url = format!("{}/token/{}", self.base_url, urlencoding::encode(token));

        let response = self
            .http
            .get(&url)
            .header(SESSION_TOKEN_HEADER, server_token)
            .send()
            .await
            .map_err(|e| AppError::Identity(e.to_string()))?;

        match response.status().as_u16() {
            200 => response
                .json()
                .await
                .map(Some)
                .map_err(|e| AppError::Identity(format!("JSON parse error: {}", e))),
            401 | 404 => Ok(None),
            status => Err(AppError::Identity(format!("HTTP {} checking token", status))),
        }
    }

    async fn server_token(&self) -> Result<String, AppError> {
        self.token.get_or_fetch(|| self.login()).await
    }
}
