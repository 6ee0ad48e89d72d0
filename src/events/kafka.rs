// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Kafka transport for the consumer loops.
//!
//! One `StreamConsumer` per topic. Auto-commit is off; an offset is
//! committed only after its message was handled, so failed messages are
//! redelivered when the group rebalances or the service restarts.

use crate::config::KafkaConfig;
use crate::events::consumer::{run_worker, BusMessage, MessageConsumer, WorkerStats};
use futures_util::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};
use std::sync::Arc;

/// Create a consumer subscribed to `topic`.
pub fn subscribe(config: &KafkaConfig, topic: &str) -> anyhow::Result<StreamConsumer> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", &config.consumer_group)
        .set("auto.offset.reset", "earliest")
        .set("enable.auto.commit", "false")
        .set("session.timeout.ms", "30000")
        .create()?;

    consumer.subscribe(&[topic])?;
    tracing::info!(
        topic,
        consumer_group = %config.consumer_group,
        brokers = %config.brokers,
        "Subscribed to topic"
    );
    Ok(consumer)
}

fn to_bus_message(message: &BorrowedMessage<'_>) -> BusMessage {
    BusMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec),
    }
}

fn commit(consumer: &StreamConsumer, message: &BusMessage) {
    let mut tpl = TopicPartitionList::new();
    let result = tpl
        .add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )
        .and_then(|()| consumer.commit(&tpl, CommitMode::Async));

    if let Err(e) = result {
        tracing::warn!(
            topic = %message.topic,
            offset = message.offset,
            error = %e,
            "Failed to commit offset"
        );
    }
}

/// Run a consumer loop for `topic` until the stream ends.
pub async fn run_topic(
    config: KafkaConfig,
    topic: String,
    handler: Arc<dyn MessageConsumer>,
) -> anyhow::Result<WorkerStats> {
    let consumer = subscribe(&config, &topic)?;

    let messages = consumer.stream().filter_map(|result| async move {
        match result {
            Ok(message) => Some(to_bus_message(&message)),
            Err(e) => {
                tracing::error!(error = %e, "Error receiving message");
                None
            }
        }
    });

    let stats = run_worker(&topic, messages, handler.as_ref(), |message| {
        commit(&consumer, message)
    })
    .await;
    Ok(stats)
}
