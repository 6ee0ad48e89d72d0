// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-demand refresh of a user's Marketo lead.

use crate::error::AppError;
use crate::middleware::auth::ServerCaller;
use crate::services::sync::SyncOutcome;
use crate::AppState;
use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
    routing::post,
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// User routes. Mounted behind `require_server_token`.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/v1/users/{user_id}/marketo", post(refresh_user))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub user_id: String,
    pub synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Reject a blank user id with 400. Layered outside the session token
/// check, so a bad path is reported before authentication.
pub async fn reject_blank_user_id(
    Path(user_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if user_id.trim().is_empty() {
        return Err(AppError::BadRequest("missing userId".to_string()));
    }
    Ok(next.run(request).await)
}

/// Re-sync the user's lead from their current identity record.
async fn refresh_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<ServerCaller>,
    Path(user_id): Path<String>,
) -> Result<Json<RefreshResponse>, AppError> {
    let user_id = user_id.trim();

    tracing::info!(user_id, caller = %caller.user_id, "Refreshing user");
    let outcome = state.engine.refresh(user_id).await?;

    let skipped = match &outcome {
        SyncOutcome::Skipped(reason) => Some(reason.to_string()),
        SyncOutcome::Synced(crate::services::LeadSyncOutcome::Ignored(reason)) => {
            Some(reason.to_string())
        }
        SyncOutcome::Synced(_) => None,
    };

    Ok(Json(RefreshResponse {
        user_id: user_id.to_string(),
        synced: skipped.is_none(),
        skipped,
    }))
}
