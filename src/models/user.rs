// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity-service user model.

use serde::{Deserialize, Serialize};

/// Account role marking a clinic (not clinician) account.
pub const CLINIC_ACCOUNT_ROLE: &str = "clinic";

/// User record as returned by the identity service and embedded in
/// lifecycle events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(rename = "userid", default)]
    pub user_id: String,
    /// Login name, which is the account email
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Timestamp of terms acceptance; empty when never accepted
    #[serde(default)]
    pub terms_accepted: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub password_exists: bool,
}

impl UserData {
    pub fn email(&self) -> &str {
        &self.username
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_clinic(&self) -> bool {
        self.has_role(CLINIC_ACCOUNT_ROLE)
    }

    /// Verified with terms accepted: the state in which a lead exists.
    pub fn is_sync_eligible(&self) -> bool {
        self.email_verified && !self.terms_accepted.is_empty()
    }
}

/// Result of an identity token check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
    #[serde(rename = "userid", default)]
    pub user_id: String,
    #[serde(rename = "isserver", default)]
    pub is_server: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_data_wire_format() {
        let user: UserData = serde_json::from_value(serde_json::json!({
            "userid": "abc123",
            "username": "Jane@Example.com",
            "emails": ["Jane@Example.com"],
            "roles": ["clinic"],
            "termsAccepted": "2024-01-01T00:00:00Z",
            "emailVerified": true
        }))
        .unwrap();

        assert_eq!(user.user_id, "abc123");
        assert_eq!(user.email(), "Jane@Example.com");
        assert!(user.is_clinic());
        assert!(user.is_sync_eligible());
        assert!(!user.password_exists);
    }

    #[test]
    fn test_missing_terms_is_not_eligible() {
        let user = UserData {
            email_verified: true,
            ..Default::default()
        };
        assert!(!user.is_sync_eligible());
    }
}
