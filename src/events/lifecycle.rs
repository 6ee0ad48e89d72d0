// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account lifecycle events published by the identity service.

use crate::error::AppError;
use crate::models::{ChangeKind, UserChange, UserData};
use serde::Deserialize;

/// One lifecycle event, tagged by `event`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum LifecycleEvent {
    CreateUser {
        user: UserData,
    },
    UpdateUser {
        original: UserData,
        updated: UserData,
    },
    DeleteUser {
        #[serde(rename = "userId", default)]
        user_id: String,
        #[serde(rename = "userData")]
        user_data: UserData,
    },
}

impl LifecycleEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, AppError> {
        serde_json::from_slice(payload)
            .map_err(|e| AppError::MalformedMessage(format!("lifecycle event: {}", e)))
    }

    /// Normalize into a [`UserChange`].
    ///
    /// An update is treated as a first-time sync (no old email) unless the
    /// original state was already verified with terms accepted, since only
    /// then can a lead exist.
    pub fn into_change(self) -> UserChange {
        match self {
            LifecycleEvent::CreateUser { user } => {
                let mut change = UserChange::from_current(&user);
                change.old_email = None;
                change.kind = ChangeKind::Create;
                change
            }
            LifecycleEvent::UpdateUser { original, updated } => {
                let mut change = UserChange::from_current(&updated);
                if change.user_id.is_empty() {
                    change.user_id = original.user_id.clone();
                }
                change.old_email = original
                    .is_sync_eligible()
                    .then(|| original.email().to_string())
                    .filter(|e| !e.is_empty());
                change
            }
            LifecycleEvent::DeleteUser { user_id, user_data } => {
                let mut change = UserChange::from_current(&user_data);
                if !user_id.is_empty() {
                    change.user_id = user_id;
                }
                change.old_email = None;
                change.kind = ChangeKind::Delete;
                change
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncSemantics;
    use serde_json::json;

    fn user(email: &str, verified: bool, terms: &str) -> serde_json::Value {
        json!({
            "userid": "u1",
            "username": email,
            "emails": [email],
            "emailVerified": verified,
            "termsAccepted": terms,
        })
    }

    #[test]
    fn test_update_after_verification_is_first_sync() {
        let payload = json!({
            "event": "update-user",
            "original": user("jane@example.com", false, ""),
            "updated": user("jane@example.com", true, "2024-01-01"),
        });
        let change = LifecycleEvent::parse(payload.to_string().as_bytes())
            .unwrap()
            .into_change();

        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(change.old_email, None);
        assert_eq!(change.semantics(), SyncSemantics::Create);
    }

    #[test]
    fn test_rename_carries_old_email() {
        let payload = json!({
            "event": "update-user",
            "original": user("a@x.com", true, "2024-01-01"),
            "updated": user("b@x.com", true, "2024-01-01"),
        });
        let change = LifecycleEvent::parse(payload.to_string().as_bytes())
            .unwrap()
            .into_change();

        assert_eq!(change.old_email.as_deref(), Some("a@x.com"));
        assert_eq!(change.new_email, "b@x.com");
        assert_eq!(change.semantics(), SyncSemantics::Update);
    }

    #[test]
    fn test_delete_keeps_last_known_state() {
        let payload = json!({
            "event": "delete-user",
            "userId": "u9",
            "userData": user("jane@example.com", true, ""),
        });
        let change = LifecycleEvent::parse(payload.to_string().as_bytes())
            .unwrap()
            .into_change();

        assert_eq!(change.kind, ChangeKind::Delete);
        assert_eq!(change.user_id, "u9");
        assert_eq!(change.new_email, "jane@example.com");
        assert!(change.email_verified);
        assert_eq!(change.old_email, None);
    }

    #[test]
    fn test_unknown_event_is_malformed() {
        let err = LifecycleEvent::parse(br#"{"event":"merge-user"}"#).unwrap_err();
        assert!(matches!(err, AppError::MalformedMessage(_)));
    }
}
