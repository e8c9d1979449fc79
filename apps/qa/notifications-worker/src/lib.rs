//! Notifications Worker Service
//!
//! ## Architecture
//!
//! ```text
//! question-events (topic) ──answer.created──► notifications-service.queue
//!   ↓ (EventWorker, AMQP_CONSUMERS consumers, prefetch AMQP_PREFETCH)
//! NotificationProcessor
//!   ↓
//! NotificationService<PgNotificationRepository> ◄── /api/notifications
//!   ↓                                          ◄── RetentionSweeper (cron)
//! PostgreSQL
//! ```
//!
//! Admin endpoints (`/health`, `/ready`, `/metrics`, `/queue/info`, `/dlq/*`)
//! share the HTTP listener with the API.

use amqp_worker::{
    AdminState, Broker, EventWorker, ReadinessProbe, Topology, WorkerConfig, admin_router,
};
use async_trait::async_trait;
use axum_helpers::{ShutdownCoordinator, create_router, serve};
use core_config::{Environment, FromEnv, amqp::AmqpConfig, server::ServerConfig};
use database::common::{RetryConfig, retry_with_backoff};
use database::postgres::{
    DatabaseConnection, PostgresConfig, check_health, connect_from_config_with_retry,
    run_migrations,
};
use domain_notifications::{
    ApiDoc, NotificationProcessor, NotificationService, NotificationsTopology,
    PgNotificationRepository, RetentionConfig, RetentionSweeper,
};
use eyre::{Result, WrapErr};
use migration::Migrator;
use std::sync::Arc;
use tracing::{error, info, warn};

const APP_NAME: &str = env!("CARGO_PKG_NAME");
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `/ready` probe for the notification store
struct DatabaseProbe {
    db: DatabaseConnection,
}

#[async_trait]
impl ReadinessProbe for DatabaseProbe {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> Result<(), String> {
        check_health(&self.db).await.map_err(|e| e.to_string())
    }
}

/// Run the notifications worker until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error if configuration is invalid, PostgreSQL or RabbitMQ stay
/// unreachable after retrying, the broker topology cannot be declared, or the
/// event worker fails.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);
    amqp_worker::init_metrics().wrap_err("Failed to install Prometheus recorder")?;

    info!(name = APP_NAME, version = APP_VERSION, ?environment, "Starting notifications worker");

    let server_config = ServerConfig::from_env().wrap_err("Failed to load server configuration")?;
    let pg_config =
        PostgresConfig::from_env().wrap_err("Failed to load PostgreSQL configuration")?;
    let amqp_config = AmqpConfig::from_env().wrap_err("Failed to load AMQP configuration")?;
    let retention_config =
        RetentionConfig::from_env().wrap_err("Failed to load retention configuration")?;

    info!("Connecting to PostgreSQL...");
    let db = connect_from_config_with_retry(pg_config, None)
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;
    run_migrations::<Migrator>(&db, APP_NAME)
        .await
        .wrap_err("Failed to run migrations")?;

    info!("Connecting to RabbitMQ...");
    let broker = retry_with_backoff(|| Broker::connect(&amqp_config), RetryConfig::default())
        .await
        .wrap_err("Failed to connect to RabbitMQ")?;
    let topology = Arc::new(Topology::from_def::<NotificationsTopology>(&amqp_config));
    broker
        .declare(&topology)
        .await
        .wrap_err("Failed to declare broker topology")?;

    let service = NotificationService::new(PgNotificationRepository::new(db.clone()));

    let sweeper = Arc::new(RetentionSweeper::new(service.clone(), retention_config));
    let scheduler = sweeper
        .start()
        .await
        .wrap_err("Failed to start retention sweeper")?;

    let shutdown = ShutdownCoordinator::new();
    let signals = shutdown.clone();
    tokio::spawn(async move { signals.listen_for_signals().await });

    let admin = AdminState::new(broker.clone(), Arc::clone(&topology), APP_NAME, APP_VERSION)
        .with_probe(Arc::new(DatabaseProbe { db }));
    let app = create_router::<ApiDoc>(
        domain_notifications::router(service.clone()).merge(admin_router(admin)),
    );
    let http_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        serve(app, &server_config, async move { http_shutdown.wait().await }).await
    });

    let worker_config = WorkerConfig::for_topology(&topology).with_amqp_config(&amqp_config);
    let worker = EventWorker::new(
        broker.clone(),
        Arc::new(domain_events::registry()),
        Arc::new(NotificationProcessor::new(service)),
        worker_config,
    );
    let worker_result = worker.run(shutdown.subscribe()).await;

    // A failed worker takes the HTTP server down with it
    shutdown.trigger();

    if let Some(mut scheduler) = scheduler {
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Failed to stop retention scheduler");
        }
    }

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
        Err(e) => error!(error = %e, "HTTP server task panicked"),
    }

    broker.close();
    worker_result.wrap_err("Event worker failed")?;

    info!("Notifications worker stopped");
    Ok(())
}
