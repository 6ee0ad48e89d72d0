// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Marketo API error: {0}")]
    Crm(String),

    #[error("Clinic service error: {0}")]
    ClinicService(String),

    #[error("Identity service error: {0}")]
    Identity(String),

    #[error("Timed out after {seconds}s waiting for {operation}")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for failures of a downstream service. These are surfaced as
    /// handler errors so the bus can redeliver the message.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::Crm(_)
                | AppError::ClinicService(_)
                | AppError::Identity(_)
                | AppError::Timeout { .. }
        )
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
            AppError::MalformedMessage(msg) => (
                StatusCode::BAD_REQUEST,
                "malformed_message",
                Some(msg.clone()),
            ),
            AppError::Crm(_)
            | AppError::ClinicService(_)
            | AppError::Identity(_)
            | AppError::Timeout { .. } => {
                tracing::error!(error = %self, "Downstream service error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "upstream_error",
                    Some(self.to_string()),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
