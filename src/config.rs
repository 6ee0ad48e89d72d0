// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets (Marketo client secret, server secret) are injected as environment
//! variables by the deployment and read once at startup.

use std::env;
use validator::Validate;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Marketo REST API settings
    pub marketo: MarketoConfig,
    /// Base URL of the identity service (shoreline)
    pub identity_url: String,
    /// Base URL of the clinic (relationship) service
    pub clinic_service_url: String,
    /// Name this service logs in to the identity service with
    pub server_name: String,
    /// Shared secret for identity server login
    pub server_secret: String,
    /// Email domains that never reach the CRM (e.g. `tidepool.org`)
    pub reserved_email_domains: Vec<String>,
    pub kafka: KafkaConfig,
}

/// Marketo connection settings.
#[derive(Debug, Clone, Validate)]
pub struct MarketoConfig {
    /// Marketo client ID
    #[validate(length(min = 1, message = "marketo: ID is missing"))]
    pub id: String,
    /// Marketo client secret
    #[validate(length(min = 1, message = "marketo: secret is missing"))]
    pub secret: String,
    /// Endpoint: https://xxx-xxx-xxx.mktorest.com
    #[validate(length(min = 1, message = "marketo: url is missing"))]
    pub url: String,
    /// `userType` bucket for clinic accounts
    #[validate(length(min = 1, message = "marketo: clinic role is missing"))]
    pub clinic_role: String,
    /// `userType` bucket for accounts without clinic relationships
    #[validate(length(min = 1, message = "marketo: patient role is missing"))]
    pub patient_role: String,
    /// HTTP request timeout in seconds
    #[validate(range(min = 1, message = "marketo: timeout must be at least one second"))]
    pub timeout_secs: u64,
}

/// Event bus settings. Topic names are joined with `topic_prefix`.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic_prefix: String,
    pub user_events_topic: String,
    pub users_cdc_topic: String,
    pub roles_cdc_topic: String,
    pub consumer_group: String,
}

impl KafkaConfig {
    /// Fully qualified topic name.
    pub fn topic(&self, name: &str) -> String {
        format!("{}{}", self.topic_prefix, name)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is loaded first if present (local development).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let marketo = MarketoConfig {
            id: required("MARKETO_ID")?,
            secret: required("MARKETO_SECRET").map(|v| v.trim().to_string())?,
            url: required("MARKETO_URL").map(|v| v.trim_end_matches('/').to_string())?,
            clinic_role: required("MARKETO_CLINIC_ROLE")?,
            patient_role: required("MARKETO_PATIENT_ROLE")?,
            timeout_secs: env::var("MARKETO_TIMEOUT")
                .ok()
                .map(|v| {
                    v.trim()
                        .parse()
                        .map_err(|_| ConfigError::Invalid(format!("MARKETO_TIMEOUT: {v}")))
                })
                .transpose()?
                .unwrap_or(30),
        };
        marketo
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            marketo,
            identity_url: required("SHORELINE_URL")?,
            clinic_service_url: required("CLINIC_SERVICE_URL")?,
            server_name: env::var("SERVER_NAME").unwrap_or_else(|_| "marketo-service".to_string()),
            server_secret: required("SERVER_SECRET").map(|v| v.trim().to_string())?,
            reserved_email_domains: parse_domains(
                &env::var("RESERVED_EMAIL_DOMAINS")
                    .unwrap_or_else(|_| "tidepool.io,tidepool.org".to_string()),
            ),
            kafka: KafkaConfig {
                brokers: env::var("KAFKA_BROKERS").unwrap_or_default(),
                topic_prefix: env::var("KAFKA_TOPIC_PREFIX").unwrap_or_default(),
                user_events_topic: env::var("KAFKA_USER_EVENTS_TOPIC")
                    .unwrap_or_else(|_| "user-events".to_string()),
                users_cdc_topic: env::var("KAFKA_USERS_CDC_TOPIC")
                    .unwrap_or_else(|_| "keycloak.public.user_entity".to_string()),
                roles_cdc_topic: env::var("KAFKA_ROLES_CDC_TOPIC")
                    .unwrap_or_else(|_| "keycloak.public.user_role_mapping".to_string()),
                consumer_group: env::var("KAFKA_CONSUMER_GROUP")
                    .unwrap_or_else(|_| "marketo-service".to_string()),
            },
        })
    }

    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            marketo: MarketoConfig {
                id: "test_client_id".to_string(),
                secret: "test_secret".to_string(),
                url: "http://localhost:9999".to_string(),
                clinic_role: "clinic".to_string(),
                patient_role: "patient".to_string(),
                timeout_secs: 5,
            },
            identity_url: "http://localhost:9107".to_string(),
            clinic_service_url: "http://localhost:8080".to_string(),
            server_name: "marketo-service".to_string(),
            server_secret: "test_server_secret".to_string(),
            reserved_email_domains: vec!["tidepool.io".to_string(), "tidepool.org".to_string()],
            kafka: KafkaConfig {
                brokers: String::new(),
                topic_prefix: "test-".to_string(),
                user_events_topic: "user-events".to_string(),
                users_cdc_topic: "keycloak.public.user_entity".to_string(),
                roles_cdc_topic: "keycloak.public.user_role_mapping".to_string(),
                consumer_group: "marketo-service".to_string(),
            },
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

/// Split a comma separated domain list, dropping blanks and any leading `@`.
fn parse_domains(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().trim_start_matches('@').to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
