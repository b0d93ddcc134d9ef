use std::sync::Arc;
use std::time::Duration;

use relay_artifacts::ArtifactStore;
use relay_ledger::UsageLedger;
use relay_providers::ProviderRegistry;
use relay_types::{
    Owner, PriceConfig, ProviderCredentials, RelayResult, TaskResponseRow, ToolStep, UsageLog,
    UserKind,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::progress::ProgressSink;

/// Everything a [`crate::ToolHandler`] needs, per §4.4: task identifiers,
/// `inputParams`, the snapshotted tool config, a progress sink, and adapters
/// for the Provider Registry, Artifact Store, and Ledger.
pub struct HandlerContext {
    pub task_id: Uuid,
    pub owner: Owner,
    /// The worker process's own configured queue prefix (§4.5), not
    /// `owner.kind` — a job's payload is never trusted to pick which
    /// credential catalog gets charged.
    worker_kind: UserKind,
    pub parent_task_id: Option<Uuid>,
    pub tool_slug: String,
    pub input_params: JsonValue,
    pub price_config: PriceConfig,
    pub steps: Vec<ToolStep>,

    providers: Arc<dyn ProviderRegistry>,
    artifacts: Arc<dyn ArtifactStore>,
    ledger: Arc<dyn UsageLedger>,
    progress: Arc<dyn ProgressSink>,
    pub http: reqwest::Client,
}

impl HandlerContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task_id: Uuid,
        owner: Owner,
        worker_kind: UserKind,
        parent_task_id: Option<Uuid>,
        tool_slug: String,
        input_params: JsonValue,
        price_config: PriceConfig,
        steps: Vec<ToolStep>,
        providers: Arc<dyn ProviderRegistry>,
        artifacts: Arc<dyn ArtifactStore>,
        ledger: Arc<dyn UsageLedger>,
        progress: Arc<dyn ProgressSink>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            task_id,
            owner,
            worker_kind,
            parent_task_id,
            tool_slug,
            input_params,
            price_config,
            steps,
            providers,
            artifacts,
            ledger,
            progress,
            http,
        }
    }

    pub async fn report_progress(&self, pct: u8, message: Option<String>) -> RelayResult<()> {
        self.progress.report(pct, message).await
    }

    /// Credentials are resolved by the *worker's* configured prefix
    /// (`self.worker_kind`), never by the job payload's `owner.kind` — a
    /// mis-routed job must not be able to spend the wrong catalog's
    /// credits (§4.5).
    pub async fn credentials(&self, provider_slug: &str) -> RelayResult<ProviderCredentials> {
        self.providers.get_credentials(self.worker_kind, provider_slug).await
    }

    pub async fn put_artifact(
        &self,
        step_suffix: Option<&str>,
        ext: &str,
        body: bytes::Bytes,
    ) -> RelayResult<String> {
        self.artifacts
            .put(&self.owner, self.task_id, &self.tool_slug, step_suffix, ext, body)
            .await
    }

    pub async fn fetch_and_put_artifact(
        &self,
        step_suffix: Option<&str>,
        ext: &str,
        source_url: &str,
    ) -> RelayResult<String> {
        self.artifacts
            .fetch_and_put(&self.owner, self.task_id, &self.tool_slug, step_suffix, ext, source_url)
            .await
    }

    /// Sign a URL for outbound use (§4.7: short TTL for provider-bound input
    /// artifacts). No-op for URLs not rooted at our own CDN origins.
    pub fn sign_artifact_url(&self, unsigned_url: &str, ttl: Duration) -> RelayResult<String> {
        self.artifacts.sign(unsigned_url, ttl)
    }

    pub async fn record_response(&self, row: TaskResponseRow) {
        self.ledger.record_response(row).await;
    }

    pub async fn record_usage(&self, log: UsageLog) {
        self.ledger.record_usage(log).await;
    }
}
