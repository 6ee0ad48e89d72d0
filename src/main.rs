// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketo-Sync Server
//!
//! Consumes account events and keeps Marketo leads in sync, and serves the
//! on-demand refresh endpoint.

use marketo_sync::{
    config::Config,
    events::{LifecycleEventsConsumer, MessageConsumer, RoleCdcConsumer, UserCdcConsumer},
    services::{ClinicServiceClient, CrmClient, MarketoClient, ShorelineClient},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Marketo-Sync");

    let timeout = Duration::from_secs(config.marketo.timeout_secs);

    let identity = Arc::new(ShorelineClient::new(
        &config.identity_url,
        config.server_name.clone(),
        config.server_secret.clone(),
        timeout,
    )?);
    let clinics = Arc::new(ClinicServiceClient::new(
        &config.clinic_service_url,
        identity.clone(),
        timeout,
    )?);
    let marketo = Arc::new(MarketoClient::new(&config.marketo)?);

    if marketo.is_available().await {
        tracing::info!(url = %config.marketo.url, "Marketo client ready");
    } else {
        // Requests log in again on demand.
        tracing::warn!(url = %config.marketo.url, "Marketo unavailable at startup");
    }

    let state = Arc::new(AppState::new(&config, identity, clinics, marketo));

    let consumers: Vec<(String, Arc<dyn MessageConsumer>)> = vec![
        (
            config.kafka.topic(&config.kafka.user_events_topic),
            Arc::new(LifecycleEventsConsumer::new(state.engine.clone())) as Arc<dyn MessageConsumer>,
        ),
        (
            config.kafka.topic(&config.kafka.users_cdc_topic),
            Arc::new(UserCdcConsumer::new(state.engine.clone())) as Arc<dyn MessageConsumer>,
        ),
        (
            config.kafka.topic(&config.kafka.roles_cdc_topic),
            Arc::new(RoleCdcConsumer::new(state.engine.clone())) as Arc<dyn MessageConsumer>,
        ),
    ];
    start_consumers(&config, consumers);

    let app = marketo_sync::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(feature = "kafka")]
fn start_consumers(config: &Config, consumers: Vec<(String, Arc<dyn MessageConsumer>)>) {
    if config.kafka.brokers.is_empty() {
        tracing::warn!("KAFKA_BROKERS not set, event consumers disabled");
        return;
    }
    for (topic, consumer) in consumers {
        let kafka = config.kafka.clone();
        tokio::spawn(async move {
            match marketo_sync::events::kafka::run_topic(kafka, topic.clone(), consumer).await {
                Ok(stats) => tracing::info!(topic = %topic, ?stats, "Consumer stopped"),
                Err(e) => tracing::error!(topic = %topic, error = %e, "Consumer failed"),
            }
        });
    }
}

#[cfg(not(feature = "kafka"))]
fn start_consumers(_config: &Config, consumers: Vec<(String, Arc<dyn MessageConsumer>)>) {
    let topics: Vec<_> = consumers.into_iter().map(|(topic, _)| topic).collect();
    tracing::warn!(
        ?topics,
        "Built without the kafka feature, event consumers disabled"
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("marketo_sync=debug,info")),
        )
        .with(format)
        .init();
}
