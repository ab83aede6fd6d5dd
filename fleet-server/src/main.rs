//! Fleet monitoring server.
//!
//! Wires the Heartbeat Gateway to the HTTP boundary and spawns the
//! background subsystems: the transactional outbox dispatcher, the three
//! event consumers, and the stale-agent sweeper.

use std::sync::Arc;

use fleet_config::ConfigLoader;
use fleet_contracts::messages::topics;
use fleet_core::broker::{KafkaBrokerConsumer, KafkaBrokerProducer};
use fleet_core::cache::LivenessCache;
use fleet_core::consumers::{ConsumerGroupRunner, MetricsSink, StatusUpdater, UptimeLogWriter};
use fleet_core::database::postgres::{
    PostgresAgentRepository, PostgresMetricsSinkRepository, PostgresOutboxRepository,
    PostgresUptimeLogRepository,
};
use fleet_core::database::{connect, run_migrations};
use fleet_core::gateway::HeartbeatGateway;
use fleet_core::outbox::OutboxDispatcher;
use fleet_core::sweeper::StaleAgentSweeper;
use fleet_server::auth::OpaqueTokenIssuer;
use fleet_server::{routes, AppState};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_server=info,fleet_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConfigLoader::load()?;
    info!("configuration loaded");

    let pool = connect(&config.database.url, config.database.max_connections).await?;
    run_migrations(&pool).await?;
    info!("database connected and migrated");

    let agents = Arc::new(PostgresAgentRepository::new(pool.clone()));
    let outbox_repo = Arc::new(PostgresOutboxRepository::new(pool.clone()));
    let uptime_log = Arc::new(PostgresUptimeLogRepository::new(pool.clone()));
    let metrics_sink_repo = Arc::new(PostgresMetricsSinkRepository::new(pool.clone()));

    let gateway_cache = LivenessCache::connect(&config.redis.url).await?;
    let sweeper_cache = Arc::new(tokio::sync::Mutex::new(
        LivenessCache::connect(&config.redis.url).await?,
    ));
    info!("redis liveness cache connected");

    let producer = Arc::new(KafkaBrokerProducer::new(
        &config.broker.bootstrap_servers,
        &config.broker.client_id,
    )?);

    let gateway = Arc::new(HeartbeatGateway::new(
        Arc::clone(&agents),
        Arc::clone(&outbox_repo),
        gateway_cache,
        config.gateway.liveness_multiplier,
    ));

    let shutdown = CancellationToken::new();

    let dispatcher = Arc::new(OutboxDispatcher::new(
        Arc::clone(&outbox_repo),
        Arc::clone(&producer),
        config.dispatcher.clone(),
    ));
    let mut handles = dispatcher.spawn_all(shutdown.clone());

    let status_updater_consumer = Arc::new(KafkaBrokerConsumer::new(
        &config.broker.bootstrap_servers,
        "fleet-status-updater",
        topics::MONITORING,
    )?);
    let status_updater = Arc::new(StatusUpdater::new(Arc::clone(&agents)));
    let status_updater_runner = Arc::new(ConsumerGroupRunner::new(
        "status-updater",
        status_updater_consumer,
        status_updater,
    ));
    handles.push(status_updater_runner.spawn(shutdown.clone()));

    let uptime_log_consumer = Arc::new(KafkaBrokerConsumer::new(
        &config.broker.bootstrap_servers,
        "fleet-uptime-log-writer",
        topics::STATUS_CHANGE,
    )?);
    let uptime_log_writer = Arc::new(UptimeLogWriter::new(Arc::clone(&uptime_log)));
    let uptime_log_runner = Arc::new(ConsumerGroupRunner::new(
        "uptime-log-writer",
        uptime_log_consumer,
        uptime_log_writer,
    ));
    handles.push(uptime_log_runner.spawn(shutdown.clone()));

    let metrics_sink_consumer = Arc::new(KafkaBrokerConsumer::new(
        &config.broker.bootstrap_servers,
        "fleet-metrics-sink",
        topics::MONITORING,
    )?);
    let metrics_sink = Arc::new(MetricsSink::new(Arc::clone(&metrics_sink_repo)));
    let metrics_sink_runner = Arc::new(ConsumerGroupRunner::new(
        "metrics-sink",
        metrics_sink_consumer,
        metrics_sink,
    ));
    handles.push(metrics_sink_runner.spawn(shutdown.clone()));

    let sweeper = Arc::new(StaleAgentSweeper::new(
        Arc::clone(&agents),
        Arc::clone(&outbox_repo),
        sweeper_cache,
    ));
    let sweeper_handle = {
        let sweeper = Arc::clone(&sweeper);
        let schedule = config.sweeper.schedule.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = sweeper.spawn(&schedule, shutdown).await {
                error!(error = %err, "sweeper task exited with an error");
            }
        })
    };
    handles.push(sweeper_handle);

    let state = AppState {
        agents: Arc::clone(&agents),
        gateway,
        credential_issuer: Arc::new(OpaqueTokenIssuer),
    };

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "fleet server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal(shutdown.clone()))
        .await?;

    info!("waiting for background tasks to stop");
    for handle in handles {
        if let Err(err) = handle.await {
            warn!(error = %err, "background task panicked during shutdown");
        }
    }

    pool.close().await;
    info!("shutdown complete");
    Ok(())
}

/// Resolves once SIGINT/SIGTERM is received, cancelling `shutdown` so every
/// background loop stops before axum stops accepting connections (spec §5
/// shutdown sequence, steps 1-2).
async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, stopping new HTTP requests");
    shutdown.cancel();
}
