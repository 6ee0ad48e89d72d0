// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Change-capture records from the identity database.
//!
//! Messages may be bare `{op, before, after}` objects or wrapped in the
//! `{schema, payload}` envelope. A message with no value, or whose envelope
//! payload is null, is a compaction tombstone and carries no change.

use crate::error::AppError;
use crate::models::{ChangeKind, UserChange};
use serde::Deserialize;
use serde_json::Value;

/// Operation code of a change-capture record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CdcOp {
    #[serde(rename = "r")]
    Snapshot,
    #[serde(rename = "c")]
    Create,
    #[serde(rename = "u")]
    Update,
    #[serde(rename = "d")]
    Delete,
}

/// Row of the user entity table. Only the columns used here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserEntityRow {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub username: Option<String>,
}

impl UserEntityRow {
    fn email(&self) -> &str {
        self.email
            .as_deref()
            .filter(|e| !e.is_empty())
            .or(self.username.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct UserEntityEvent {
    op: String,
    #[serde(default)]
    before: Option<UserEntityRow>,
    #[serde(default)]
    after: Option<UserEntityRow>,
}

/// Key of the role mapping table; the only part of a role message used.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoleMappingKey {
    #[serde(default)]
    pub role_id: Option<String>,
    pub user_id: String,
}

/// Strip the `{schema, payload}` envelope. `None` for a null payload.
fn unwrap_envelope(value: Value) -> Option<Value> {
    match value {
        Value::Object(mut map) if map.contains_key("payload") && map.contains_key("schema") => {
            map.remove("payload").filter(|p| !p.is_null())
        }
        Value::Null => None,
        other => Some(other),
    }
}

fn parse_value(bytes: &[u8], what: &str) -> Result<Option<Value>, AppError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| AppError::MalformedMessage(format!("{}: {}", what, e)))?;
    Ok(unwrap_envelope(value))
}

/// Normalize a user-entity record. `Ok(None)` means there is nothing to do.
///
/// The resulting change lacks terms and roles; callers enrich it from the
/// identity service before gating.
pub fn parse_user_event(payload: Option<&[u8]>) -> Result<Option<UserChange>, AppError> {
    let Some(bytes) = payload.filter(|b| !b.is_empty()) else {
        return Ok(None);
    };
    let Some(value) = parse_value(bytes, "user entity record")? else {
        return Ok(None);
    };

    let event: UserEntityEvent = serde_json::from_value(value)
        .map_err(|e| AppError::MalformedMessage(format!("user entity record: {}", e)))?;
    let op: CdcOp = serde_json::from_value(Value::String(event.op.clone()))
        .map_err(|_| AppError::MalformedMessage(format!("unknown op {}", event.op)))?;

    let change = match op {
        CdcOp::Snapshot | CdcOp::Create | CdcOp::Update => {
            let Some(after) = event.after else {
                return Err(AppError::MalformedMessage(format!(
                    "op {} without after image",
                    event.op
                )));
            };
            // Only a verified prior image can have a lead to find.
            let old_email = event
                .before
                .filter(|b| op == CdcOp::Update && b.email_verified)
                .map(|b| b.email().to_string())
                .filter(|e| !e.is_empty());

            UserChange {
                user_id: after.id.clone(),
                old_email,
                new_email: after.email().to_string(),
                email_verified: after.email_verified,
                terms_accepted: None,
                roles: vec![],
                kind: match op {
                    CdcOp::Snapshot => ChangeKind::Snapshot,
                    CdcOp::Create => ChangeKind::Create,
                    _ => ChangeKind::Update,
                },
            }
        }
        CdcOp::Delete => {
            let Some(before) = event.before else {
                tracing::debug!("Delete record without before image, ignoring");
                return Ok(None);
            };
            UserChange {
                user_id: before.id.clone(),
                old_email: None,
                new_email: before.email().to_string(),
                email_verified: before.email_verified,
                terms_accepted: None,
                roles: vec![],
                kind: ChangeKind::Delete,
            }
        }
    };

    Ok(Some(change))
}

/// Parse the key of a role-mapping record.
pub fn parse_role_key(key: Option<&[u8]>) -> Result<RoleMappingKey, AppError> {
    let bytes = key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::MalformedMessage("role mapping record without key".into()))?;
    let value = parse_value(bytes, "role mapping key")?
        .ok_or_else(|| AppError::MalformedMessage("role mapping key is null".into()))?;
    let key: RoleMappingKey = serde_json::from_value(value)
        .map_err(|e| AppError::MalformedMessage(format!("role mapping key: {}", e)))?;
    if key.user_id.is_empty() {
        return Err(AppError::MalformedMessage(
            "role mapping key without user_id".into(),
        ));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncSemantics;
    use serde_json::json;

    fn row(email: &str, verified: bool) -> Value {
        json!({"id": "u1", "email": email, "email_verified": verified, "username": email})
    }

    fn parse(value: Value) -> Result<Option<UserChange>, AppError> {
        parse_user_event(Some(value.to_string().as_bytes()))
    }

    #[test]
    fn test_tombstones_are_ignored() {
        assert_eq!(parse_user_event(None).unwrap(), None);
        assert_eq!(parse_user_event(Some(b"")).unwrap(), None);
        assert_eq!(parse_user_event(Some(b"null")).unwrap(), None);
        assert_eq!(
            parse(json!({"schema": {}, "payload": null})).unwrap(),
            None
        );
    }

    #[test]
    fn test_snapshot_and_create_have_no_prior_state() {
        for op in ["r", "c"] {
            let change = parse(json!({"op": op, "after": row("a@x.com", true)}))
                .unwrap()
                .unwrap();
            assert_eq!(change.old_email, None, "{op}");
            assert_eq!(change.semantics(), SyncSemantics::Create);
        }
    }

    #[test]
    fn test_update_uses_verified_before_image() {
        let change = parse(json!({
            "op": "u",
            "before": row("a@x.com", true),
            "after": row("b@x.com", true),
        }))
        .unwrap()
        .unwrap();
        assert_eq!(change.old_email.as_deref(), Some("a@x.com"));
        assert_eq!(change.new_email, "b@x.com");

        let first_verification = parse(json!({
            "op": "u",
            "before": row("a@x.com", false),
            "after": row("a@x.com", true),
        }))
        .unwrap()
        .unwrap();
        assert_eq!(first_verification.old_email, None);
    }

    #[test]
    fn test_enveloped_delete() {
        let change = parse(json!({
            "schema": {"type": "struct"},
            "payload": {"op": "d", "before": row("a@x.com", true), "after": null},
        }))
        .unwrap()
        .unwrap();
        assert_eq!(change.kind, ChangeKind::Delete);
        assert_eq!(change.new_email, "a@x.com");
        assert!(change.email_verified);
    }

    #[test]
    fn test_unknown_op_is_malformed() {
        let err = parse(json!({"op": "t", "after": row("a@x.com", true)})).unwrap_err();
        assert!(matches!(err, AppError::MalformedMessage(_)));
        assert!(parse_user_event(Some(b"{not json")).is_err());
    }

    #[test]
    fn test_role_key() {
        let key = parse_role_key(Some(br#"{"role_id":"r1","user_id":"u1"}"#)).unwrap();
        assert_eq!(key.user_id, "u1");
        assert!(parse_role_key(None).is_err());
        assert!(parse_role_key(Some(br#"{"role_id":"r1","user_id":""}"#)).is_err());
    }
}
