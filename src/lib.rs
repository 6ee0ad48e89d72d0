// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Marketo-Sync: keep Marketo leads in step with user accounts
//!
//! This crate consumes account lifecycle and change-capture events, decides
//! which changes matter to marketing, classifies users by their clinic
//! relationships, and creates, updates or unsubscribes the matching Marketo
//! lead. An HTTP endpoint refreshes a single user on demand.

pub mod config;
pub mod error;
pub mod events;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::{
    ClassificationResolver, ClinicDirectory, CrmClient, IdentityClient, LeadSynchronizer,
    SyncEngine, SyncGate, UserTypeBuckets,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub identity: Arc<dyn IdentityClient>,
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    /// Wire the sync engine from its collaborators.
    pub fn new(
        config: &Config,
        identity: Arc<dyn IdentityClient>,
        directory: Arc<dyn ClinicDirectory>,
        crm: Arc<dyn CrmClient>,
    ) -> Self {
        let gate = SyncGate::new(&config.reserved_email_domains);
        let resolver = ClassificationResolver::new(
            directory,
            UserTypeBuckets {
                clinic: config.marketo.clinic_role.clone(),
                patient: config.marketo.patient_role.clone(),
            },
        );
        let synchronizer = LeadSynchronizer::new(crm, gate.clone());
        let engine = SyncEngine::new(gate, resolver, synchronizer, identity.clone());

        Self {
            identity,
            engine: Arc::new(engine),
        }
    }
}
