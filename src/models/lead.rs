// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketo lead wire types.

use serde::{Deserialize, Serialize};

/// Lead fields pushed to Marketo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncInput {
    /// Marketo lead id; only present on `updateOnly` requests
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<i64>,
    #[serde(rename = "tidepoolID")]
    pub tidepool_id: String,
    pub email: String,
    #[serde(rename = "userType")]
    pub user_type: String,
    pub unsubscribed: bool,
    #[serde(rename = "deletedAccount")]
    pub deleted_account: bool,
    #[serde(rename = "clinicWorkspaceMemberofMultipleClinics")]
    pub is_member_of_multiple_clinics: bool,
    #[serde(rename = "clinicWorkspacePrescriber")]
    pub is_prescriber: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpsertAction {
    CreateOnly,
    UpdateOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LookupField {
    Email,
    Id,
}

/// Body of `POST /rest/v1/leads.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub action: UpsertAction,
    #[serde(rename = "lookupField")]
    pub lookup_field: LookupField,
    pub input: Vec<SyncInput>,
}

impl UpsertRequest {
    /// Create a new lead keyed by email. Any id on the input is dropped.
    pub fn create_only(mut input: SyncInput) -> Self {
        input.id = None;
        Self {
            action: UpsertAction::CreateOnly,
            lookup_field: LookupField::Email,
            input: vec![input],
        }
    }

    /// Update the existing lead `id`.
    pub fn update_only(id: i64, mut input: SyncInput) -> Self {
        input.id = Some(id);
        Self {
            action: UpsertAction::UpdateOnly,
            lookup_field: LookupField::Id,
            input: vec![input],
        }
    }
}

/// Lead as returned by the lookup endpoint (`fields=email,id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
}

/// Outcome of looking a lead up by email.
#[derive(Debug, Clone, PartialEq)]
pub enum LeadLookup {
    Missing,
    Found(LeadRecord),
    /// More than one lead shares the email
    Ambiguous(usize),
}

impl LeadLookup {
    pub fn from_results(mut leads: Vec<LeadRecord>) -> Self {
        match leads.len() {
            0 => LeadLookup::Missing,
            1 => LeadLookup::Found(leads.remove(0)),
            n => LeadLookup::Ambiguous(n),
        }
    }

    /// Id of the lead to update. Ambiguous matches are never updated.
    pub fn existing_id(&self) -> Option<i64> {
        match self {
            LeadLookup::Found(lead) => Some(lead.id),
            LeadLookup::Missing | LeadLookup::Ambiguous(_) => None,
        }
    }
}

/// Standard Marketo REST envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmResponse<T> {
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    pub success: bool,
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
    #[serde(default)]
    pub errors: Vec<CrmError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Per-record result of a create/update request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    #[serde(default)]
    pub id: Option<i64>,
    pub status: String,
    #[serde(default)]
    pub reasons: Vec<CrmError>,
}

impl RecordResult {
    pub fn is_skipped(&self) -> bool {
        self.status == "skipped"
    }
}

/// Format CRM errors as `code: message` pairs.
pub fn describe_errors(errors: &[CrmError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> SyncInput {
        SyncInput {
            id: Some(7),
            tidepool_id: "u1".to_string(),
            email: "a@example.com".to_string(),
            user_type: "patient".to_string(),
            unsubscribed: false,
            deleted_account: false,
            is_member_of_multiple_clinics: false,
            is_prescriber: false,
        }
    }

    #[test]
    fn test_create_only_wire_format_has_no_id() {
        let body = serde_json::to_value(UpsertRequest::create_only(input())).unwrap();
        assert_eq!(body["action"], "createOnly");
        assert_eq!(body["lookupField"], "email");
        assert!(body["input"][0].get("id").is_none());
        assert_eq!(body["input"][0]["tidepoolID"], "u1");
        assert_eq!(
            body["input"][0]["clinicWorkspaceMemberofMultipleClinics"],
            false
        );
    }

    #[test]
    fn test_update_only_embeds_id() {
        let body = serde_json::to_value(UpsertRequest::update_only(42, input())).unwrap();
        assert_eq!(body["action"], "updateOnly");
        assert_eq!(body["lookupField"], "id");
        assert_eq!(body["input"][0]["id"], 42);
    }

    #[test]
    fn test_lookup_from_results() {
        let lead = |id| LeadRecord {
            id,
            email: Some("a@example.com".to_string()),
        };
        assert_eq!(LeadLookup::from_results(vec![]), LeadLookup::Missing);
        assert_eq!(LeadLookup::from_results(vec![lead(1)]).existing_id(), Some(1));

        let ambiguous = LeadLookup::from_results(vec![lead(1), lead(2)]);
        assert_eq!(ambiguous, LeadLookup::Ambiguous(2));
        assert_eq!(ambiguous.existing_id(), None);
    }

    #[test]
    fn test_crm_response_without_result() {
        let response: CrmResponse<LeadRecord> = serde_json::from_str(
            r#"{"requestId":"e42b#14272d07d78","success":false,"errors":[{"code":"601","message":"Access token invalid"}]}"#,
        )
        .unwrap();
        assert!(!response.success);
        assert!(response.result.is_empty());
        assert_eq!(describe_errors(&response.errors), "601: Access token invalid");
    }
}
