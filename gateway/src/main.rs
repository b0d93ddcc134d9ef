//! Intake Service (C5) + SSE Gateway (C9) + read endpoints + the pending-task
//! sweeper (§4.2, §4.9, §6, §10.1), all in one process since none of them
//! execute tool handlers — that's the `worker` binary's job.

mod dto;
mod endpoints;
mod metrics;
mod owner;
mod signal;
mod state;
mod sweeper;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use relay_catalog::PgToolCatalog;
use relay_db::PgTaskStore;
use relay_progress::RedisProgressBus;
use relay_queue::PgQueueBroker;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::state::{AcceptedOwners, AppState, GatewayConfig};

#[derive(Debug, Clone, Copy, clap::ValueEnum, Default)]
enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum AcceptedOwnersArg {
    Web,
    Admin,
    Both,
}

impl From<AcceptedOwnersArg> for AcceptedOwners {
    fn from(value: AcceptedOwnersArg) -> Self {
        match value {
            AcceptedOwnersArg::Web => AcceptedOwners::WebOnly,
            AcceptedOwnersArg::Admin => AcceptedOwners::AdminOnly,
            AcceptedOwnersArg::Both => AcceptedOwners::Both,
        }
    }
}

/// Environment configuration for the Intake Service / SSE Gateway (spec.md
/// §6).
#[derive(Parser, Debug)]
#[command(version, about = "Relay gateway: task intake, reads, and SSE progress fan-out")]
struct Args {
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[arg(long, env = "REDIS_URL")]
    redis_url: String,

    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:3000")]
    bind_address: SocketAddr,

    #[arg(long, env = "ACCEPTED_OWNERS", value_enum, default_value = "both")]
    accepted_owners: AcceptedOwnersArg,

    #[arg(long, env = "DEFAULT_MAX_ATTEMPTS", default_value_t = 3)]
    default_max_attempts: u32,

    #[arg(long, env = "BACKOFF_BASE_MS", default_value_t = 2_000)]
    backoff_base_ms: u64,

    #[arg(long, env = "BACKOFF_MAX_MS", default_value_t = 60_000)]
    backoff_max_ms: u64,

    /// How often the orphaned-pending-task sweeper runs (§4.2 failure mode
    /// recovery).
    #[arg(long, env = "SWEEPER_INTERVAL_MS", default_value_t = 30_000)]
    sweeper_interval_ms: u64,

    /// A `pending` task is only swept once it's been sitting untouched for
    /// at least this long, so the sweeper never races a just-accepted
    /// intake whose enqueue is merely slow.
    #[arg(long, env = "SWEEPER_ORPHAN_AGE_MS", default_value_t = 30_000)]
    sweeper_orphan_age_ms: i64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_format);

    if let Err(err) = run(args).await {
        tracing::error!(error = %err, "gateway exited with a fatal error");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), anyhow::Error> {
    let metrics_handle = metrics::install_recorder()?;

    let pool = PgPoolOptions::new().max_connections(20).connect(&args.database_url).await?;

    let task_store = PgTaskStore::new(pool.clone());
    task_store.run_migrations().await?;

    let queue_broker = PgQueueBroker::new(pool.clone());
    queue_broker.run_migrations().await?;

    let catalog = PgToolCatalog::new(pool.clone());
    catalog.run_migrations().await?;

    let progress_bus = RedisProgressBus::connect(&args.redis_url).await?;

    let config = Arc::new(GatewayConfig {
        accepted_owners: args.accepted_owners.into(),
        sweeper_interval_ms: args.sweeper_interval_ms,
        sweeper_orphan_age_ms: args.sweeper_orphan_age_ms,
        default_max_attempts: args.default_max_attempts,
        backoff_base_ms: args.backoff_base_ms,
        backoff_max_ms: args.backoff_max_ms,
    });

    let state = AppState {
        task_store: Arc::new(task_store),
        queue_broker: Arc::new(queue_broker),
        catalog: Arc::new(catalog),
        progress_bus: Arc::new(progress_bus),
        config,
    };

    let cancel = CancellationToken::new();
    let sweeper_state = state.clone();
    let sweeper_cancel = cancel.clone();
    let sweeper_handle = tokio::spawn(async move {
        sweeper::run(sweeper_state, sweeper_cancel).await;
    });

    let router = Router::new()
        .route("/tasks", post(endpoints::intake::create_task).get(endpoints::tasks::list_tasks))
        .route("/tasks/{id}", get(endpoints::tasks::get_task))
        .route("/tasks/{id}/stream", get(endpoints::stream::stream_task))
        .route("/status", get(endpoints::health::status_handler))
        .route("/health", get(endpoints::health::health_handler))
        .route("/metrics", get(move || std::future::ready(metrics_handle.render())))
        .fallback(endpoints::fallback::handle_404)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(args.bind_address).await?;
    tracing::info!(addr = %args.bind_address, "relay gateway listening");

    axum::serve(listener, router).with_graceful_shutdown(signal::shutdown_signal()).await?;

    tracing::info!("shutting down sweeper");
    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await;

    Ok(())
}
