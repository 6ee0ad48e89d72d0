// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lead synchronizer: idempotent find-or-create-or-update of one lead.
//!
//! Workflow:
//! 1. Normalize the new email and the lookup email (pre-change email if known)
//! 2. Find the lead by the lookup email
//! 3. Update it by id if exactly one matched, otherwise create by email
//!
//! Nothing is retried here; errors go back to the caller, which either
//! returns them over HTTP or lets the bus redeliver the message.

use crate::error::Result;
use crate::models::{Classification, LeadLookup, SyncInput, UpsertRequest};
use crate::services::gate::{SkipReason, SyncGate};
use crate::services::marketo::CrmClient;
use std::sync::Arc;

/// What the synchronizer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadSyncOutcome {
    Created,
    Updated { id: i64 },
    Ignored(SkipReason),
}

/// Pushes lead state to the CRM. Holds no mutable state between calls.
#[derive(Clone)]
pub struct LeadSynchronizer {
    crm: Arc<dyn CrmClient>,
    gate: SyncGate,
}

impl LeadSynchronizer {
    pub fn new(crm: Arc<dyn CrmClient>, gate: SyncGate) -> Self {
        Self { crm, gate }
    }

    /// Create or update the lead for `tidepool_id`.
    ///
    /// `old_email` is the email the lead was last synced under; when present
    /// it is used for the lookup so a rename updates the existing lead.
    pub async fn upsert(
        &self,
        tidepool_id: &str,
        old_email: Option<&str>,
        new_email: &str,
        is_delete: bool,
        classification: &Classification,
    ) -> Result<LeadSyncOutcome> {
        let new_email = new_email.trim().to_lowercase();
        if new_email.is_empty() {
            tracing::debug!(tidepool_id, "Empty email, nothing to sync");
            return Ok(LeadSyncOutcome::Ignored(SkipReason::EmptyEmail));
        }
        if self.gate.is_reserved(&new_email) {
            tracing::debug!(tidepool_id, "Reserved domain email, nothing to sync");
            return Ok(LeadSyncOutcome::Ignored(SkipReason::ReservedDomain));
        }

        let lookup_email = old_email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| new_email.clone());

        let input = SyncInput {
            id: None,
            tidepool_id: tidepool_id.to_string(),
            email: new_email,
            user_type: classification.user_type.clone(),
            unsubscribed: is_delete,
            deleted_account: is_delete,
            is_member_of_multiple_clinics: classification.is_member_of_multiple_clinics,
            is_prescriber: classification.is_prescriber,
        };

        let lookup = self.crm.find_lead(&lookup_email).await?;
        if let LeadLookup::Ambiguous(count) = lookup {
            tracing::warn!(
                tidepool_id,
                count,
                "Multiple leads share the lookup email, treating as not found"
            );
        }

        let (request, outcome) = match lookup.existing_id() {
            Some(id) => (
                UpsertRequest::update_only(id, input),
                LeadSyncOutcome::Updated { id },
            ),
            None => (UpsertRequest::create_only(input), LeadSyncOutcome::Created),
        };

        let results = self.crm.upsert(&request).await.inspect_err(|e| {
            tracing::error!(
                tidepool_id,
                error = %e,
                "Marketo failure upserting lead"
            );
        })?;

        for skipped in results.iter().filter(|r| r.is_skipped()) {
            tracing::warn!(
                tidepool_id,
                lead_id = ?skipped.id,
                reasons = %crate::models::lead::describe_errors(&skipped.reasons),
                "Marketo skipped lead record"
            );
        }

        tracing::info!(tidepool_id, outcome = ?outcome, "Lead synced");
        Ok(outcome)
    }
}
