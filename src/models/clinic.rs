// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clinic relationship model (relationship service) and derived classification.

use serde::{Deserialize, Serialize};

pub const CLINIC_ADMIN_ROLE: &str = "CLINIC_ADMIN";
pub const CLINIC_MEMBER_ROLE: &str = "CLINIC_MEMBER";
pub const PRESCRIBER_ROLE: &str = "PRESCRIBER";

/// One clinician-to-clinic relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicRelationship {
    #[serde(default)]
    pub clinic: Option<ClinicSummary>,
    #[serde(default)]
    pub clinician: ClinicianMembership,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicSummary {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicianMembership {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl ClinicRelationship {
    /// Relationship carrying the given clinician role tags.
    pub fn with_roles(roles: &[&str]) -> Self {
        Self {
            clinic: None,
            clinician: ClinicianMembership {
                id: None,
                roles: roles.iter().map(|r| r.to_string()).collect(),
            },
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.clinician.roles.iter().any(|r| r == role)
    }
}

/// CRM classification of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub user_type: String,
    pub is_prescriber: bool,
    pub is_member_of_multiple_clinics: bool,
}
