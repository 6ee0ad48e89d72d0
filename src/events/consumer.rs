// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Message consumers for the three event sources and the worker loop that
//! drives them.

use crate::error::AppError;
use crate::events::cdc::{parse_role_key, parse_user_event};
use crate::events::lifecycle::LifecycleEvent;
use crate::services::gate::SkipReason;
use crate::services::sync::{SyncEngine, SyncOutcome};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;

/// A message as delivered by the bus, independent of the client library.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    /// `None` for tombstones
    pub payload: Option<Vec<u8>>,
}

/// Handles messages from one topic.
///
/// An `Err` means the message was not handled and should be redelivered;
/// skipped changes are `Ok`.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    async fn handle(&self, message: &BusMessage) -> Result<(), AppError>;
}

fn log_outcome(message: &BusMessage, user_id: &str, outcome: &SyncOutcome) {
    if outcome.is_skipped() {
        tracing::debug!(
            topic = %message.topic,
            offset = message.offset,
            user_id,
            outcome = ?outcome,
            "Change skipped"
        );
    } else {
        tracing::info!(
            topic = %message.topic,
            offset = message.offset,
            user_id,
            outcome = ?outcome,
            "Change synced"
        );
    }
}

/// Lifecycle events (create, update, delete) from the identity service.
pub struct LifecycleEventsConsumer {
    engine: Arc<SyncEngine>,
}

impl LifecycleEventsConsumer {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl MessageConsumer for LifecycleEventsConsumer {
    async fn handle(&self, message: &BusMessage) -> Result<(), AppError> {
        let Some(payload) = message.payload.as_deref() else {
            return Ok(());
        };
        let change = LifecycleEvent::parse(payload)?.into_change();
        let outcome = self.engine.apply(&change).await?;
        log_outcome(message, &change.user_id, &outcome);
        Ok(())
    }
}

/// Change-capture records of the user entity table.
pub struct UserCdcConsumer {
    engine: Arc<SyncEngine>,
}

impl UserCdcConsumer {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl MessageConsumer for UserCdcConsumer {
    async fn handle(&self, message: &BusMessage) -> Result<(), AppError> {
        let Some(change) = parse_user_event(message.payload.as_deref())? else {
            tracing::debug!(topic = %message.topic, offset = message.offset, "Tombstone ignored");
            return Ok(());
        };

        // Records carry no terms, so anything the gate rejects for another
        // reason is dropped before the identity lookup. Deletes are gated on
        // the before image alone.
        let change = if change.is_delete() {
            change
        } else {
            match self.engine.gate().check(&change) {
                Err(reason) if reason != SkipReason::TermsNotAccepted => {
                    log_outcome(message, &change.user_id, &SyncOutcome::Skipped(reason));
                    return Ok(());
                }
                _ => match self.engine.enrich(change).await? {
                    Some(change) => change,
                    None => return Ok(()),
                },
            }
        };

        let outcome = self.engine.apply(&change).await?;
        log_outcome(message, &change.user_id, &outcome);
        Ok(())
    }
}

/// Change-capture records of the role mapping table. Any change triggers a
/// refresh of the user.
pub struct RoleCdcConsumer {
    engine: Arc<SyncEngine>,
}

impl RoleCdcConsumer {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl MessageConsumer for RoleCdcConsumer {
    async fn handle(&self, message: &BusMessage) -> Result<(), AppError> {
        let key = parse_role_key(message.key.as_deref())?;
        tracing::debug!(user_id = %key.user_id, role_id = ?key.role_id, "Role mapping changed");
        let outcome = self.engine.refresh(&key.user_id).await?;
        log_outcome(message, &key.user_id, &outcome);
        Ok(())
    }
}

/// Counters for one worker loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub handled: u64,
    pub failed: u64,
}

/// Process a stream of messages one at a time, in order.
///
/// Handler errors are logged and counted; the loop moves on to the next
/// message. `on_handled` is called after each successful message, so the
/// caller can commit its position.
///
/// A failed message is never committed itself, but a later success on the
/// same partition commits past it. The failed change is only redelivered if
/// the worker restarts before that happens.
pub async fn run_worker<S, F>(
    name: &str,
    stream: S,
    consumer: &dyn MessageConsumer,
    mut on_handled: F,
) -> WorkerStats
where
    S: Stream<Item = BusMessage>,
    F: FnMut(&BusMessage),
{
    tracing::info!(worker = name, "Starting consumer loop");
    let mut stats = WorkerStats::default();
    futures_util::pin_mut!(stream);

    while let Some(message) = stream.next().await {
        match consumer.handle(&message).await {
            Ok(()) => {
                stats.handled += 1;
                on_handled(&message);
            }
            Err(e) => {
                stats.failed += 1;
                tracing::error!(
                    worker = name,
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    upstream = e.is_upstream(),
                    "Failed to process message"
                );
            }
        }
    }

    tracing::info!(worker = name, handled = stats.handled, failed = stats.failed, "Consumer loop ended");
    stats
}
