// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - sync logic and downstream clients.

pub mod classification;
pub mod clinic;
pub mod gate;
pub mod identity;
pub mod lead_sync;
pub mod marketo;
pub mod sync;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod token;

pub use classification::{ClassificationResolver, UserTypeBuckets};
pub use clinic::{ClinicDirectory, ClinicServiceClient};
pub use gate::{SkipReason, SyncGate};
pub use identity::{IdentityClient, ShorelineClient};
pub use lead_sync::{LeadSyncOutcome, LeadSynchronizer};
pub use marketo::{CrmClient, MarketoClient};
pub use sync::{SyncEngine, SyncOutcome, SYNC_DEADLINE};
