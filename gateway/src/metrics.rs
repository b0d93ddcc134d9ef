//! Prometheus exporter for the gateway binary (§10.2). Rendered inline
//! through an axum route rather than its own listener, since the gateway
//! already runs an HTTP server.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub fn install_recorder() -> Result<PrometheusHandle, anyhow::Error> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| anyhow::anyhow!("failed to install Prometheus recorder: {err}"))?;
    Ok(handle)
}

pub fn record_task_enqueued(tool_slug: &str) {
    metrics::counter!("relay_tasks_enqueued_total", "tool_slug" => tool_slug.to_string()).increment(1);
}

pub fn record_sweeper_requeued(count: u64) {
    metrics::counter!("relay_sweeper_requeued_total").increment(count);
}
