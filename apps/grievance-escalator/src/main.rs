//! Grievance escalation service.
//!
//! Runs the scheduled escalation worker and serves the admin API on one
//! runtime. SIGINT/SIGTERM drain the HTTP server first, then stop the worker
//! after any in-flight cycle.

mod config;
mod logging;

use std::net::SocketAddr;
use std::sync::Arc;

use grievance_api::{escalation_router, EscalationApiState};
use grievance_db::{run_migrations, DbPool, PoolSettings};
use grievance_escalation::{
    threshold_resolver, EscalationJob, EscalationNotice, EscalationPublisher, EscalationStore,
    EscalationWorker, PgEscalationStore, TimeoutStore, WorkerStatus,
};
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;

/// Buffered notices before slow subscribers start lagging.
const NOTICE_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        env = %config.app_env,
        dry_run = config.dry_run,
        "Starting grievance escalator"
    );

    if config.admin_token.is_none() {
        if config.tokenless_admin {
            warn!(
                env = %config.app_env,
                "ESCALATION_ADMIN_TOKEN not set, admin endpoints are open"
            );
        } else {
            warn!(
                env = %config.app_env,
                "ESCALATION_ADMIN_TOKEN not set, admin endpoints are disabled"
            );
        }
    }

    let pool = match DbPool::connect_with(&config.database_url, &PoolSettings::default()).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_migrations(&pool).await {
        tracing::error!("Failed to run migrations: {e}");
        std::process::exit(1);
    }

    let thresholds = match threshold_resolver(config.sla_override_minutes) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Invalid SLA override: {e}");
            std::process::exit(1);
        }
    };

    if let Some(interval) = config.pilot_interval {
        warn!(
            target: "escalation::pilot",
            interval_secs = interval.as_secs(),
            "PILOT INTERVAL ACTIVE: escalation cycles run far more often than in production"
        );
    }

    let store: Arc<dyn EscalationStore> = Arc::new(TimeoutStore::new(
        PgEscalationStore::new(pool.inner().clone()),
        config.db_timeout,
    ));

    let (publisher, notices) = EscalationPublisher::new(NOTICE_CHANNEL_CAPACITY);
    tokio::spawn(log_notices(notices));

    let job = Arc::new(
        EscalationJob::new(Arc::clone(&store), thresholds, config.engine_settings())
            .with_publisher(publisher),
    );

    let worker_status = Arc::new(WorkerStatus::default());
    let worker = EscalationWorker::new(Arc::clone(&job), config.worker_config())
        .with_status(Arc::clone(&worker_status))
        .start();

    let state = EscalationApiState::new(job, store, worker_status, config.admin_access());
    let app = escalation_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = match config.bind_addr().parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid bind address '{}': {e}", config.bind_addr());
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!(%addr, "Server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {e}");
    }

    info!("Stopping escalation worker...");
    worker.stop().await;
    info!("Shutdown complete");
}

/// Log every committed escalation.
///
/// Stands in for the notification service; the channel is the seam.
async fn log_notices(mut notices: broadcast::Receiver<EscalationNotice>) {
    loop {
        match notices.recv().await {
            Ok(notice) => info!(
                target: "escalation::notify",
                complaint_id = %notice.complaint_id,
                record_id = %notice.record_id,
                from_level = notice.from_level,
                to_level = notice.to_level,
                authority_id = %notice.authority_id,
                dry_run = notice.dry_run,
                "Escalation notice"
            ),
            Err(RecvError::Lagged(skipped)) => {
                warn!(target: "escalation::notify", skipped, "Notice subscriber lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
