//! Worker Pool (C6) process entrypoint: reserves jobs across a configured
//! set of queues, dispatches them to `relay-handlers`, and renews leases for
//! long-running handlers (§4.3).

mod metrics;
mod processing;
mod signal;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;
use relay_artifacts::ObjectStoreArtifactAdapter;
use relay_catalog::{validate_against_handlers, PgToolCatalog, ToolCatalog};
use relay_db::PgTaskStore;
use relay_handlers::{BackgroundRemoveHandler, HandlerRegistry, Photo3DHandler};
use relay_ledger::PgUsageLedger;
use relay_progress::RedisProgressBus;
use relay_providers::PgProviderRegistry;
use relay_queue::{PgQueueBroker, QueueName};
use relay_types::UserKind;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::processing::ProcessorDeps;

#[derive(Debug, Clone, Copy, clap::ValueEnum, Default)]
enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Environment configuration for the Worker Pool (spec.md §6).
#[derive(Parser, Debug)]
#[command(version, about = "Relay worker: reserves and executes queued tool tasks")]
struct Args {
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[arg(long, env = "REDIS_URL")]
    redis_url: String,

    /// "" for the web-facing worker, "admin" for the admin-facing one.
    #[arg(long, env = "QUEUE_PREFIX", default_value = "")]
    queue_prefix: String,

    #[arg(long, env = "QUEUE_NAMES", default_value = "default", value_delimiter = ',')]
    queue_names: Vec<String>,

    #[arg(long, env = "WORKER_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    #[arg(long, env = "WORKER_SHUTDOWN_TIMEOUT_MS", default_value_t = 30_000)]
    shutdown_timeout_ms: u64,

    #[arg(long, env = "VISIBILITY_TIMEOUT_MS", default_value_t = 60_000)]
    visibility_timeout_ms: u64,

    #[arg(long, env = "RELAY_ENV", default_value = "production")]
    env_name: String,

    #[arg(long, env = "USER_BUCKET")]
    user_bucket: String,
    #[arg(long, env = "USER_BUCKET_REGION")]
    user_bucket_region: String,
    #[arg(long, env = "USER_CDN_ORIGIN")]
    user_cdn_origin: String,

    #[arg(long, env = "ADMIN_BUCKET")]
    admin_bucket: String,
    #[arg(long, env = "ADMIN_BUCKET_REGION")]
    admin_bucket_region: String,
    #[arg(long, env = "ADMIN_CDN_ORIGIN")]
    admin_cdn_origin: String,

    /// Hex-encoded HMAC key for artifact URL signing. Absence degrades to
    /// unsigned passthrough with a logged warning (§6).
    #[arg(long, env = "ARTIFACT_SIGNING_KEY")]
    artifact_signing_key: Option<String>,

    /// Hex-encoded 32-byte AES-256-GCM key for provider credentials at rest.
    #[arg(long, env = "PROVIDER_MASTER_KEY")]
    provider_master_key: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,

    #[arg(long, env = "PROMETHEUS_ADDRESS", default_value = "0.0.0.0:9091")]
    prometheus_address: SocketAddr,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

fn build_object_store(bucket: &str, region: &str) -> Result<Arc<dyn ObjectStore>, anyhow::Error> {
    let store = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .with_region(region)
        .build()?;
    Ok(Arc::new(store))
}

fn decode_hex_key(hex_str: &str) -> Result<[u8; 32], anyhow::Error> {
    let bytes = hex::decode(hex_str)?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| anyhow::anyhow!("PROVIDER_MASTER_KEY must decode to exactly 32 bytes"))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_format);

    if let Err(err) = run(args).await {
        tracing::error!(error = %err, "worker exited with a fatal error");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), anyhow::Error> {
    metrics::install_recorder(args.prometheus_address)?;

    let owner_kind = match args.queue_prefix.as_str() {
        "" => UserKind::Web,
        "admin" => UserKind::Admin,
        other => anyhow::bail!("QUEUE_PREFIX must be \"\" or \"admin\", got {other:?}"),
    };

    let pool = PgPoolOptions::new().max_connections(20).connect(&args.database_url).await?;

    let task_store = PgTaskStore::new(pool.clone());
    task_store.run_migrations().await?;

    let queue_broker = PgQueueBroker::new(pool.clone());
    queue_broker.run_migrations().await?;

    let provider_master_key = decode_hex_key(&args.provider_master_key)?;
    let providers = PgProviderRegistry::new(pool.clone(), provider_master_key, Duration::from_secs(300));
    providers.run_migrations().await?;

    let catalog = PgToolCatalog::new(pool.clone());
    catalog.run_migrations().await?;

    let ledger = PgUsageLedger::new(pool.clone());
    ledger.run_migrations().await?;

    let progress_bus = RedisProgressBus::connect(&args.redis_url).await?;

    let http = reqwest::Client::builder().timeout(Duration::from_secs(120)).build()?;

    let user_store = build_object_store(&args.user_bucket, &args.user_bucket_region)?;
    let admin_store = build_object_store(&args.admin_bucket, &args.admin_bucket_region)?;
    let signing_secret = match &args.artifact_signing_key {
        Some(hex_key) => hex::decode(hex_key)?,
        None => {
            tracing::warn!("ARTIFACT_SIGNING_KEY not set; artifact URLs will be served unsigned");
            Vec::new()
        }
    };
    let artifacts = ObjectStoreArtifactAdapter::new(
        args.env_name.clone(),
        user_store,
        args.user_cdn_origin.clone(),
        admin_store,
        args.admin_cdn_origin.clone(),
        signing_secret,
        http.clone(),
    );

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(BackgroundRemoveHandler));
    registry.register(Arc::new(Photo3DHandler));
    let registry = Arc::new(registry);

    let tools = catalog.list().await?;
    let missing = validate_against_handlers(&tools, &registry.slugs());
    for slug in &missing {
        tracing::warn!(tool_slug = %slug, "active tool has no registered handler");
    }

    let deps = Arc::new(ProcessorDeps {
        task_store: Arc::new(task_store),
        queue_broker: Arc::new(queue_broker),
        providers: Arc::new(providers),
        artifacts: Arc::new(artifacts),
        ledger: Arc::new(ledger),
        progress_bus: Arc::new(progress_bus),
        registry,
        worker_kind: owner_kind,
        http,
        visibility_timeout_ms: args.visibility_timeout_ms,
    });

    let worker_id = format!("{}-{}", args.queue_prefix, uuid::Uuid::now_v7());
    let queue_names: Vec<QueueName> = args
        .queue_names
        .iter()
        .map(|name| QueueName::new(owner_kind, name.trim().to_string()))
        .collect();

    tracing::info!(
        ?queue_names,
        concurrency = args.concurrency,
        worker_id = %worker_id,
        "starting worker"
    );

    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();
    let semaphore = Arc::new(tokio::sync::Semaphore::new(args.concurrency));

    for queue_name in queue_names {
        let deps = deps.clone();
        let cancel = cancel.clone();
        let semaphore = semaphore.clone();
        let worker_id = worker_id.clone();
        let tracker_inner = tracker.clone();
        tracker.spawn(async move {
            processing::reserve_loop(deps, queue_name, worker_id, semaphore, cancel, tracker_inner).await;
        });
    }

    signal::wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining in-flight jobs");
    cancel.cancel();
    tracker.close();

    let drained = tokio::time::timeout(Duration::from_millis(args.shutdown_timeout_ms), tracker.wait()).await;
    if drained.is_err() {
        tracing::error!("shutdown timed out waiting for in-flight jobs; exiting anyway");
        std::process::exit(1);
    }

    tracing::info!("worker shut down cleanly");
    Ok(())
}
