// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token authentication middleware.

use crate::services::identity::SESSION_TOKEN_HEADER;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated caller extracted from the session token.
#[derive(Debug, Clone)]
pub struct ServerCaller {
    pub user_id: String,
}

/// Middleware that requires a valid server session token.
///
/// Missing, invalid and non-server tokens are 403. A failure to reach the
/// identity service is 500, not a rejection.
pub async fn require_server_token(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(SESSION_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            tracing::warn!("Blocked request without session token");
            StatusCode::FORBIDDEN
        })?
        .to_string();

    let token_data = state
        .identity
        .check_token(&token)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Session token check failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or_else(|| {
            tracing::warn!("Blocked request with invalid session token");
            StatusCode::FORBIDDEN
        })?;

    if !token_data.is_server {
        tracing::warn!(user_id = %token_data.user_id, "Blocked request from non-server token");
        return Err(StatusCode::FORBIDDEN);
    }

    request.extensions_mut().insert(ServerCaller {
        user_id: token_data.user_id,
    });

    Ok(next.run(request).await)
}
