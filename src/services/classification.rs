// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Classification of users into Marketo `userType` buckets.
//!
//! The classification is derived from the account itself (clinic accounts)
//! and from the user's clinician relationships in the clinic service.

use crate::error::Result;
use crate::models::clinic::{CLINIC_ADMIN_ROLE, CLINIC_MEMBER_ROLE, PRESCRIBER_ROLE};
use crate::models::{Classification, ClinicRelationship};
use crate::services::clinic::ClinicDirectory;
use std::sync::Arc;

/// Maximum relationships fetched per user.
///
/// This is a hard limit, not a page: relationships beyond it are never seen,
/// so a clinician in more clinics gets a classification computed from an
/// arbitrary subset. A full page is logged as possibly truncated.
pub const RELATIONSHIP_PAGE_LIMIT: usize = 1000;

/// Configured `userType` values for non-clinician accounts.
#[derive(Debug, Clone)]
pub struct UserTypeBuckets {
    pub clinic: String,
    pub patient: String,
}

/// Resolves the CRM classification of a user.
#[derive(Clone)]
pub struct ClassificationResolver {
    directory: Arc<dyn ClinicDirectory>,
    buckets: UserTypeBuckets,
}

impl ClassificationResolver {
    pub fn new(directory: Arc<dyn ClinicDirectory>, buckets: UserTypeBuckets) -> Self {
        Self { directory, buckets }
    }

    /// Fetch the user's clinic relationships and classify.
    ///
    /// A failed relationship lookup fails the whole sync; it is never read as
    /// "no relationships".
    pub async fn resolve(&self, user_id: &str, is_clinic_account: bool) -> Result<Classification> {
        let relationships = self
            .directory
            .list_clinic_relationships(user_id, RELATIONSHIP_PAGE_LIMIT)
            .await?;

        if relationships.len() >= RELATIONSHIP_PAGE_LIMIT {
            tracing::warn!(
                user_id,
                count = relationships.len(),
                "Clinic relationships hit the page limit, classification may be incomplete"
            );
        }

        let classification = classify(is_clinic_account, &relationships, &self.buckets);
        tracing::debug!(
            user_id,
            relationships = relationships.len(),
            user_type = %classification.user_type,
            is_prescriber = classification.is_prescriber,
            "Resolved classification"
        );
        Ok(classification)
    }

    /// Classification for a deleted account. Relationships are not consulted.
    pub fn for_deleted(&self, is_clinic_account: bool) -> Classification {
        classify(is_clinic_account, &[], &self.buckets)
    }
}

/// Derive the classification from the account type and its relationships.
pub fn classify(
    is_clinic_account: bool,
    relationships: &[ClinicRelationship],
    buckets: &UserTypeBuckets,
) -> Classification {
    let user_type = if is_clinic_account {
        buckets.clinic.clone()
    } else if !relationships.is_empty() {
        highest_clinic_role(relationships)
    } else {
        buckets.patient.clone()
    };

    Classification {
        user_type,
        is_prescriber: has_prescriber_role(relationships),
        is_member_of_multiple_clinics: relationships.len() > 1,
    }
}

/// Admin outranks member; member is the default for any clinician.
fn highest_clinic_role(relationships: &[ClinicRelationship]) -> String {
    let role = if relationships.iter().any(|r| r.has_role(CLINIC_ADMIN_ROLE)) {
        CLINIC_ADMIN_ROLE
    } else {
        CLINIC_MEMBER_ROLE
    };
    role.to_lowercase()
}

/// Only counted for clinicians in more than one clinic.
fn has_prescriber_role(relationships: &[ClinicRelationship]) -> bool {
    relationships.len() > 1 && relationships.iter().any(|r| r.has_role(PRESCRIBER_ROLE))
}
