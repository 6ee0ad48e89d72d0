// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event sources: message normalizers and consumer loops.

pub mod cdc;
pub mod consumer;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod lifecycle;

pub use consumer::{
    run_worker, BusMessage, LifecycleEventsConsumer, MessageConsumer, RoleCdcConsumer,
    UserCdcConsumer, WorkerStats,
};
pub use lifecycle::LifecycleEvent;
