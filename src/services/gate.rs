// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync gate: decides whether a change reaches Marketo at all.

use crate::models::UserChange;

/// Why a change was not synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyEmail,
    ReservedDomain,
    NotVerified,
    TermsNotAccepted,
    /// Deleted before ever being verified, so no lead exists
    NeverVerified,
    /// Identity service no longer knows the user
    UserNotFound,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::EmptyEmail => "empty_email",
            SkipReason::ReservedDomain => "reserved_domain",
            SkipReason::NotVerified => "not_verified",
            SkipReason::TermsNotAccepted => "terms_not_accepted",
            SkipReason::NeverVerified => "never_verified",
            SkipReason::UserNotFound => "user_not_found",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure predicate over [`UserChange`]; performs no I/O.
#[derive(Debug, Clone)]
pub struct SyncGate {
    /// Lowercased `@domain` suffixes
    reserved_suffixes: Vec<String>,
}

impl SyncGate {
    pub fn new(reserved_domains: &[String]) -> Self {
        let reserved_suffixes = reserved_domains
            .iter()
            .map(|d| format!("@{}", d.trim().trim_start_matches('@').to_lowercase()))
            .filter(|s| s.len() > 1)
            .collect();
        Self { reserved_suffixes }
    }

    /// True if the email belongs to one of the organization's own domains.
    pub fn is_reserved(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.reserved_suffixes.iter().any(|s| email.ends_with(s))
    }

    pub fn should_sync(&self, change: &UserChange) -> bool {
        self.check(change).is_ok()
    }

    /// Apply the gate rules in order, returning the first that rejects.
    pub fn check(&self, change: &UserChange) -> Result<(), SkipReason> {
        if change.new_email.trim().is_empty() {
            return Err(SkipReason::EmptyEmail);
        }
        if self.is_reserved(&change.new_email) {
            return Err(SkipReason::ReservedDomain);
        }

        if change.is_delete() {
            // Only leads that could exist are unsubscribed.
            return if change.email_verified {
                Ok(())
            } else {
                Err(SkipReason::NeverVerified)
            };
        }

        if !change.email_verified {
            return Err(SkipReason::NotVerified);
        }
        if !change.has_terms_accepted() {
            return Err(SkipReason::TermsNotAccepted);
        }
        Ok(())
    }
}
