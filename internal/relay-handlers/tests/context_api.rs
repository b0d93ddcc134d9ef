//! Exercises `HandlerContext` and `HandlerRegistry` through in-memory fakes
//! of the Provider Registry, Artifact Store, Usage Ledger, and Progress
//! Sink — no live Postgres/Redis/object-store/provider call involved.
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relay_artifacts::ArtifactStore;
use relay_handlers::{HandlerContext, HandlerOutput, HandlerRegistry, ProgressSink, ToolHandler};
use relay_ledger::UsageLedger;
use relay_providers::ProviderRegistry;
use relay_types::{
    Owner, PriceConfig, ProviderCredentials, RelayError, RelayResult, TaskResponseRow, UsageLog,
    UsageStatus, UserKind,
};
use serde_json::json;
use uuid::Uuid;

/// Keyed by `(kind, slug)` so a test can assert a lookup landed on the
/// *worker's* catalog, not the job payload owner's.
struct FakeProviderRegistry {
    credentials: Mutex<Vec<(UserKind, String)>>,
}

impl FakeProviderRegistry {
    fn new() -> Self {
        Self {
            credentials: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(UserKind, String)> {
        self.credentials.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderRegistry for FakeProviderRegistry {
    async fn get_credentials(&self, kind: UserKind, slug: &str) -> RelayResult<ProviderCredentials> {
        self.credentials.lock().unwrap().push((kind, slug.to_string()));
        Ok(ProviderCredentials {
            api_key: Some(format!("key-for-{kind}")),
            access_key_id: None,
            secret_access_key: None,
            region: None,
            base_url: None,
        })
    }
}

#[derive(Default)]
struct FakeArtifactStore {
    puts: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactStore for FakeArtifactStore {
    async fn put(
        &self,
        owner: &Owner,
        task_id: Uuid,
        tool_slug: &str,
        _step_suffix: Option<&str>,
        ext: &str,
        _body: bytes::Bytes,
    ) -> RelayResult<String> {
        let url = format!("https://cdn.test/{}/{task_id}/{tool_slug}.{ext}", owner.id);
        self.puts.lock().unwrap().push(url.clone());
        Ok(url)
    }

    async fn fetch_and_put(
        &self,
        owner: &Owner,
        task_id: Uuid,
        tool_slug: &str,
        step_suffix: Option<&str>,
        ext: &str,
        _source_url: &str,
    ) -> RelayResult<String> {
        self.put(owner, task_id, tool_slug, step_suffix, ext, bytes::Bytes::new()).await
    }

    fn sign(&self, unsigned_url: &str, _ttl: Duration) -> RelayResult<String> {
        Ok(format!("{unsigned_url}?signed=1"))
    }
}

#[derive(Default)]
struct FakeUsageLedger {
    usage: Mutex<Vec<UsageLog>>,
    responses: Mutex<Vec<TaskResponseRow>>,
}

#[async_trait]
impl UsageLedger for FakeUsageLedger {
    async fn try_record_usage(&self, entry: UsageLog) -> RelayResult<()> {
        self.usage.lock().unwrap().push(entry);
        Ok(())
    }

    async fn try_record_response(&self, entry: TaskResponseRow) -> RelayResult<()> {
        self.responses.lock().unwrap().push(entry);
        Ok(())
    }
}

#[derive(Default)]
struct FakeProgressSink {
    reports: Mutex<Vec<(u8, Option<String>)>>,
}

#[async_trait]
impl ProgressSink for FakeProgressSink {
    async fn report(&self, pct: u8, message: Option<String>) -> RelayResult<()> {
        self.reports.lock().unwrap().push((pct, message));
        Ok(())
    }
}

fn test_context(
    owner_kind: UserKind,
    worker_kind: UserKind,
    providers: Arc<FakeProviderRegistry>,
    artifacts: Arc<FakeArtifactStore>,
    ledger: Arc<FakeUsageLedger>,
    progress: Arc<FakeProgressSink>,
) -> HandlerContext {
    HandlerContext::new(
        Uuid::now_v7(),
        Owner::new(owner_kind, "owner-1"),
        worker_kind,
        None,
        "test-tool".to_string(),
        json!({ "imageUrl": "https://cdn.test/in.png" }),
        PriceConfig {
            currency: "usd".to_string(),
            unit_price: 0.01,
            extra: json!({}),
        },
        Vec::new(),
        providers,
        artifacts,
        ledger,
        progress,
        reqwest::Client::new(),
    )
}

#[tokio::test]
async fn credentials_resolve_by_worker_kind_not_owner_kind() {
    let providers = Arc::new(FakeProviderRegistry::new());
    let ctx = test_context(
        UserKind::Web,
        UserKind::Admin,
        providers.clone(),
        Arc::new(FakeArtifactStore::default()),
        Arc::new(FakeUsageLedger::default()),
        Arc::new(FakeProgressSink::default()),
    );

    ctx.credentials("fal_ai").await.unwrap();

    // A web-owned job whose task landed on the admin worker must still
    // resolve against the admin catalog — never the payload's own kind.
    assert_eq!(providers.calls(), vec![(UserKind::Admin, "fal_ai".to_string())]);
}

#[tokio::test]
async fn put_artifact_and_sign_round_trip_through_the_store() {
    let artifacts = Arc::new(FakeArtifactStore::default());
    let ctx = test_context(
        UserKind::Web,
        UserKind::Web,
        Arc::new(FakeProviderRegistry::new()),
        artifacts.clone(),
        Arc::new(FakeUsageLedger::default()),
        Arc::new(FakeProgressSink::default()),
    );

    let url = ctx.put_artifact(None, "png", bytes::Bytes::from_static(b"data")).await.unwrap();
    assert!(artifacts.puts.lock().unwrap().contains(&url));

    let signed = ctx.sign_artifact_url(&url, Duration::from_secs(60)).unwrap();
    assert!(signed.ends_with("?signed=1"));
}

#[tokio::test]
async fn progress_and_usage_reach_their_sinks() {
    let progress = Arc::new(FakeProgressSink::default());
    let ledger = Arc::new(FakeUsageLedger::default());
    let ctx = test_context(
        UserKind::Web,
        UserKind::Web,
        Arc::new(FakeProviderRegistry::new()),
        Arc::new(FakeArtifactStore::default()),
        ledger.clone(),
        progress.clone(),
    );

    ctx.report_progress(42, Some("halfway".to_string())).await.unwrap();
    assert_eq!(progress.reports.lock().unwrap().as_slice(), [(42, Some("halfway".to_string()))]);

    ctx.record_usage(UsageLog {
        id: Uuid::now_v7(),
        task_id: ctx.task_id,
        owner_id: ctx.owner.id.clone(),
        provider_id: "fal_ai".to_string(),
        tool_id: "test-tool".to_string(),
        model_name: None,
        model_version: None,
        price_config: json!({}),
        usage_data: json!({}),
        latency_ms: 10,
        status: UsageStatus::Success,
        created_at: chrono::Utc::now(),
    })
    .await;
    assert_eq!(ledger.usage.lock().unwrap().len(), 1);
}

struct EchoHandler;

#[async_trait]
impl ToolHandler for EchoHandler {
    fn slug(&self) -> &'static str {
        "echo"
    }

    async fn execute(&self, ctx: &HandlerContext) -> RelayResult<HandlerOutput> {
        ctx.report_progress(100, None).await?;
        Ok(HandlerOutput {
            output_data: ctx.input_params.clone(),
            usage_data: json!({ "provider": "none" }),
        })
    }
}

struct AlwaysFailsHandler;

#[async_trait]
impl ToolHandler for AlwaysFailsHandler {
    fn slug(&self) -> &'static str {
        "always-fails"
    }

    async fn execute(&self, _ctx: &HandlerContext) -> RelayResult<HandlerOutput> {
        Err(RelayError::InvalidRequest {
            message: "nope".to_string(),
        })
    }
}

#[tokio::test]
async fn registry_dispatches_to_the_matching_handler() {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(EchoHandler));
    registry.register(Arc::new(AlwaysFailsHandler));

    assert!(registry.get("unknown-tool").is_none());
    assert_eq!(registry.slugs().len(), 2);

    let progress = Arc::new(FakeProgressSink::default());
    let ctx = test_context(
        UserKind::Web,
        UserKind::Web,
        Arc::new(FakeProviderRegistry::new()),
        Arc::new(FakeArtifactStore::default()),
        Arc::new(FakeUsageLedger::default()),
        progress,
    );

    let handler = registry.get("echo").unwrap();
    let output = handler.execute(&ctx).await.unwrap();
    assert_eq!(output.output_data, ctx.input_params);

    let failing = registry.get("always-fails").unwrap();
    let err = failing.execute(&ctx).await.unwrap_err();
    assert!(err.is_fatal());
}
