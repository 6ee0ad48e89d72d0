// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory collaborators for tests.
//!
//! These implement the same traits as the network clients and record what
//! they were asked to do, so tests can assert on the requests the sync
//! engine makes without any servers running.

use crate::error::AppError;
use crate::models::lead::{CrmError, UpsertAction};
use crate::models::{
    ClinicRelationship, LeadLookup, LeadRecord, RecordResult, SyncInput, TokenData,
    UpsertRequest, UserData,
};
use crate::services::clinic::ClinicDirectory;
use crate::services::identity::IdentityClient;
use crate::services::marketo::CrmClient;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── CRM ────────────────────────────────────────────────────────────────────

/// A lead held by [`InMemoryCrm`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLead {
    pub id: i64,
    pub input: SyncInput,
}

/// One call made against [`InMemoryCrm`].
#[derive(Debug, Clone, PartialEq)]
pub enum CrmCall {
    Find(String),
    Upsert(UpsertAction),
}

#[derive(Default)]
struct CrmState {
    leads: Vec<StoredLead>,
    calls: Vec<CrmCall>,
    upserts: Vec<UpsertRequest>,
    next_id: i64,
    failure: Option<String>,
    delay: Option<Duration>,
}

/// Fake Marketo that behaves like the real lead endpoints: `createOnly` on
/// an existing email and `updateOnly` on an unknown id are skipped.
#[derive(Default)]
pub struct InMemoryCrm {
    state: Mutex<CrmState>,
}

impl InMemoryCrm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a lead directly, returning its id. Duplicate emails are allowed.
    pub fn seed_lead(&self, tidepool_id: &str, email: &str) -> i64 {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        state.leads.push(StoredLead {
            id,
            input: SyncInput {
                id: Some(id),
                tidepool_id: tidepool_id.to_string(),
                email: email.to_string(),
                user_type: String::new(),
                unsubscribed: false,
                deleted_account: false,
                is_member_of_multiple_clinics: false,
                is_prescriber: false,
            },
        });
        id
    }

    pub fn leads(&self) -> Vec<StoredLead> {
        lock(&self.state).leads.clone()
    }

    pub fn lead_by_email(&self, email: &str) -> Option<StoredLead> {
        lock(&self.state)
            .leads
            .iter()
            .find(|l| l.input.email == email)
            .cloned()
    }

    pub fn calls(&self) -> Vec<CrmCall> {
        lock(&self.state).calls.clone()
    }

    pub fn upserts(&self) -> Vec<UpsertRequest> {
        lock(&self.state).upserts.clone()
    }

    /// Make every call fail with the given message.
    pub fn set_failure(&self, message: Option<&str>) {
        lock(&self.state).failure = message.map(str::to_string);
    }

    /// Delay every call, for deadline and locking tests.
    pub fn set_delay(&self, delay: Option<Duration>) {
        lock(&self.state).delay = delay;
    }

    async fn begin(&self, call: CrmCall) -> Result<(), AppError> {
        let delay = {
            let mut state = lock(&self.state);
            state.calls.push(call);
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.state).failure.clone() {
            Some(message) => Err(AppError::Crm(message)),
            None => Ok(()),
        }
    }
}

fn skipped(code: &str, message: &str) -> RecordResult {
    RecordResult {
        id: None,
        status: "skipped".to_string(),
        reasons: vec![CrmError {
            code: code.to_string(),
            message: message.to_string(),
        }],
    }
}

#[async_trait]
impl CrmClient for InMemoryCrm {
    async fn find_lead(&self, email: &str) -> Result<LeadLookup, AppError> {
        self.begin(CrmCall::Find(email.to_string())).await?;

        let matches = lock(&self.state)
            .leads
            .iter()
            .filter(|l| l.input.email == email)
            .map(|l| LeadRecord {
                id: l.id,
                email: Some(l.input.email.clone()),
            })
            .collect();
        Ok(LeadLookup::from_results(matches))
    }

    async fn upsert(&self, request: &UpsertRequest) -> Result<Vec<RecordResult>, AppError> {
        self.begin(CrmCall::Upsert(request.action)).await?;

        let mut state = lock(&self.state);
        state.upserts.push(request.clone());

        let mut results = Vec::with_capacity(request.input.len());
        for input in &request.input {
            let result = match request.action {
                UpsertAction::CreateOnly => {
                    if state.leads.iter().any(|l| l.input.email == input.email) {
                        skipped("1005", "Lead already exists")
                    } else {
                        state.next_id += 1;
                        let id = state.next_id;
                        let mut stored = input.clone();
                        stored.id = Some(id);
                        state.leads.push(StoredLead { id, input: stored });
                        RecordResult {
                            id: Some(id),
                            status: "created".to_string(),
                            reasons: vec![],
                        }
                    }
                }
                UpsertAction::UpdateOnly => {
                    match state.leads.iter_mut().find(|l| Some(l.id) == input.id) {
                        Some(lead) => {
                            lead.input = input.clone();
                            RecordResult {
                                id: Some(lead.id),
                                status: "updated".to_string(),
                                reasons: vec![],
                            }
                        }
                        None => skipped("1004", "Lead not found"),
                    }
                }
            };
            results.push(result);
        }
        Ok(results)
    }

    async fn is_available(&self) -> bool {
        lock(&self.state).failure.is_none()
    }
}

// ─── Identity ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct IdentityState {
    users: HashMap<String, UserData>,
    tokens: HashMap<String, TokenData>,
    failure: Option<String>,
    user_lookups: usize,
}

/// Fake identity service backed by maps of users and session tokens.
#[derive(Default)]
pub struct InMemoryIdentity {
    state: Mutex<IdentityState>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserData) {
        lock(&self.state).users.insert(user.user_id.clone(), user);
    }

    pub fn insert_token(&self, token: &str, data: TokenData) {
        lock(&self.state).tokens.insert(token.to_string(), data);
    }

    pub fn set_failure(&self, message: Option<&str>) {
        lock(&self.state).failure = message.map(str::to_string);
    }

    pub fn user_lookups(&self) -> usize {
        lock(&self.state).user_lookups
    }

    fn check_failure(&self) -> Result<(), AppError> {
        match lock(&self.state).failure.clone() {
            Some(message) => Err(AppError::Identity(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityClient for InMemoryIdentity {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserData>, AppError> {
        self.check_failure()?;
        let mut state = lock(&self.state);
        state.user_lookups += 1;
        Ok(state.users.get(user_id).cloned())
    }

    async fn check_token(&self, token: &str) -> Result<Option<TokenData>, AppError> {
        self.check_failure()?;
        Ok(lock(&self.state).tokens.get(token).cloned())
    }

    async fn server_token(&self) -> Result<String, AppError> {
        self.check_failure()?;
        Ok("in-memory-server-token".to_string())
    }
}

// ─── Clinic directory ───────────────────────────────────────────────────────

#[derive(Default)]
struct DirectoryState {
    relationships: HashMap<String, Vec<ClinicRelationship>>,
    failure_status: Option<u16>,
    calls: usize,
    last_limit: Option<usize>,
}

/// Fake clinic service keyed by user id.
#[derive(Default)]
pub struct InMemoryClinicDirectory {
    state: Mutex<DirectoryState>,
}

impl InMemoryClinicDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_relationships(&self, user_id: &str, relationships: Vec<ClinicRelationship>) {
        lock(&self.state)
            .relationships
            .insert(user_id.to_string(), relationships);
    }

    /// Respond to every lookup with this HTTP status.
    pub fn set_failure_status(&self, status: Option<u16>) {
        lock(&self.state).failure_status = status;
    }

    pub fn calls(&self) -> usize {
        lock(&self.state).calls
    }

    pub fn last_limit(&self) -> Option<usize> {
        lock(&self.state).last_limit
    }
}

#[async_trait]
impl ClinicDirectory for InMemoryClinicDirectory {
    async fn list_clinic_relationships(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ClinicRelationship>, AppError> {
        let mut state = lock(&self.state);
        state.calls += 1;
        state.last_limit = Some(limit);

        if let Some(status) = state.failure_status {
            return Err(AppError::ClinicService(format!(
                "unexpected status code {} when fetching clinics for user {}",
                status, user_id
            )));
        }

        let mut relationships = state.relationships.get(user_id).cloned().unwrap_or_default();
        relationships.truncate(limit);
        Ok(relationships)
    }
}
