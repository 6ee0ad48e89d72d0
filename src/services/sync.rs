// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync engine: runs a normalized change through gate, classification and
//! lead sync, and refreshes users on demand.
//!
//! Every downstream stage is bounded by [`SYNC_DEADLINE`]. Work for a single
//! user is serialized with a keyed lock, so two workers handling the same
//! user never interleave their lookups and upserts.

use crate::error::{AppError, Result};
use crate::models::{SyncSemantics, UserChange};
use crate::services::classification::ClassificationResolver;
use crate::services::gate::{SkipReason, SyncGate};
use crate::services::identity::IdentityClient;
use crate::services::lead_sync::{LeadSyncOutcome, LeadSynchronizer};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Deadline for each downstream stage of a sync.
pub const SYNC_DEADLINE: Duration = Duration::from_secs(30);

/// Per-user locks shared by every worker.
pub type UserLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Result of handling one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Synced(LeadSyncOutcome),
}

impl SyncOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Skipped(_) | SyncOutcome::Synced(LeadSyncOutcome::Ignored(_))
        )
    }
}

#[derive(Clone)]
pub struct SyncEngine {
    gate: SyncGate,
    resolver: ClassificationResolver,
    synchronizer: LeadSynchronizer,
    identity: Arc<dyn IdentityClient>,
    locks: UserLocks,
    deadline: Duration,
}

impl SyncEngine {
    pub fn new(
        gate: SyncGate,
        resolver: ClassificationResolver,
        synchronizer: LeadSynchronizer,
        identity: Arc<dyn IdentityClient>,
    ) -> Self {
        Self {
            gate,
            resolver,
            synchronizer,
            identity,
            locks: Arc::new(DashMap::new()),
            deadline: SYNC_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn gate(&self) -> &SyncGate {
        &self.gate
    }

    /// Number of users with a lock entry. Entries are dropped once no task
    /// holds or waits on them.
    pub fn locked_users(&self) -> usize {
        self.locks.len()
    }

    /// Apply one change to the CRM.
    pub async fn apply(&self, change: &UserChange) -> Result<SyncOutcome> {
        if let Err(reason) = self.gate.check(change) {
            tracing::debug!(
                user_id = %change.user_id,
                kind = change.kind.as_str(),
                reason = %reason,
                "Change not synced"
            );
            return Ok(SyncOutcome::Skipped(reason));
        }

        self.with_user_lock(&change.user_id, self.sync_locked(change))
            .await
    }

    async fn sync_locked(&self, change: &UserChange) -> Result<SyncOutcome> {
        let classification = if change.is_delete() {
            self.resolver.for_deleted(change.is_clinic_account())
        } else {
            self.bounded(
                "clinic service",
                self.resolver
                    .resolve(&change.user_id, change.is_clinic_account()),
            )
            .await?
        };

        let old_email = match change.semantics() {
            SyncSemantics::Update => change.old_email.as_deref(),
            SyncSemantics::Create => None,
        };

        let outcome = self
            .bounded(
                "marketo",
                self.synchronizer.upsert(
                    &change.user_id,
                    old_email,
                    &change.new_email,
                    change.is_delete(),
                    &classification,
                ),
            )
            .await?;

        Ok(SyncOutcome::Synced(outcome))
    }

    /// Fill in identity state that a change-capture row does not carry.
    ///
    /// Returns `None` if the user no longer exists.
    pub async fn enrich(&self, mut change: UserChange) -> Result<Option<UserChange>> {
        let user = self
            .bounded("identity service", self.identity.get_user(&change.user_id))
            .await?;

        match user {
            Some(user) => {
                change.enrich_from(&user);
                Ok(Some(change))
            }
            None => {
                tracing::info!(user_id = %change.user_id, "User no longer exists, dropping change");
                Ok(None)
            }
        }
    }

    /// Re-sync a user from their current identity record.
    ///
    /// Absent, unverified and no-terms users are not errors; they are
    /// reported as skipped.
    pub async fn refresh(&self, user_id: &str) -> Result<SyncOutcome> {
        let user = self
            .bounded("identity service", self.identity.get_user(user_id))
            .await?;

        let Some(user) = user else {
            tracing::info!(user_id, "User not found, nothing to refresh");
            return Ok(SyncOutcome::Skipped(SkipReason::UserNotFound));
        };

        let mut change = UserChange::from_current(&user);
        change.user_id = user_id.to_string();

        let outcome = self.apply(&change).await?;
        tracing::info!(user_id, outcome = ?outcome, "Refreshed user");
        Ok(outcome)
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(operation, "Downstream call timed out");
                Err(AppError::Timeout {
                    operation,
                    seconds: self.deadline.as_secs(),
                })
            }
        }
    }

    async fn with_user_lock<T>(&self, user_id: &str, fut: impl Future<Output = T>) -> T {
        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            fut.await
        };

        drop(lock);
        self.locks
            .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }
}
