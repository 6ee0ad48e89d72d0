// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod change;
pub mod clinic;
pub mod lead;
pub mod user;

pub use change::{ChangeKind, SyncSemantics, UserChange};
pub use clinic::{Classification, ClinicRelationship};
pub use lead::{LeadLookup, LeadRecord, RecordResult, SyncInput, UpsertRequest};
pub use user::{TokenData, UserData};
