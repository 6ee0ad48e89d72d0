// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Canonical user change record shared by every event source.

use crate::models::user::{UserData, CLINIC_ACCOUNT_ROLE};

/// What happened to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
    Snapshot,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
            ChangeKind::Snapshot => "snapshot",
        }
    }
}

/// How the existing lead is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSemantics {
    /// No prior lead assumed; look up by the new email.
    Create,
    /// Prior lead assumed; look up by the pre-change email.
    Update,
}

/// One account change, normalized from a lifecycle event or a CDC record.
///
/// A `Delete` change carries the last-known state in `new_email` and
/// `email_verified`; `old_email` is always `None` for deletes.
#[derive(Debug, Clone, PartialEq)]
pub struct UserChange {
    pub user_id: String,
    /// Email of the previously synced state, if there was one
    pub old_email: Option<String>,
    pub new_email: String,
    pub email_verified: bool,
    pub terms_accepted: Option<String>,
    /// Account roles (not clinic relationship roles)
    pub roles: Vec<String>,
    pub kind: ChangeKind,
}

impl UserChange {
    pub fn is_delete(&self) -> bool {
        self.kind == ChangeKind::Delete
    }

    pub fn is_clinic_account(&self) -> bool {
        self.roles.iter().any(|r| r == CLINIC_ACCOUNT_ROLE)
    }

    pub fn has_terms_accepted(&self) -> bool {
        self.terms_accepted
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    pub fn semantics(&self) -> SyncSemantics {
        match self.old_email.as_deref() {
            Some(email) if !email.trim().is_empty() => SyncSemantics::Update,
            _ => SyncSemantics::Create,
        }
    }

    /// Fill in state that change-capture rows do not carry.
    pub fn enrich_from(&mut self, user: &UserData) {
        if self.new_email.trim().is_empty() {
            self.new_email = user.email().to_string();
        }
        self.terms_accepted = Some(user.terms_accepted.clone()).filter(|t| !t.is_empty());
        self.roles = user.roles.clone();
    }

    /// Change describing the current state of a user, with no rename in play.
    pub fn from_current(user: &UserData) -> Self {
        Self {
            user_id: user.user_id.clone(),
            old_email: Some(user.email().to_string()),
            new_email: user.email().to_string(),
            email_verified: user.email_verified,
            terms_accepted: Some(user.terms_accepted.clone()).filter(|t| !t.is_empty()),
            roles: user.roles.clone(),
            kind: ChangeKind::Update,
        }
    }
}
