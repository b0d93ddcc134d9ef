//! Prometheus exporter for the worker binary (§10.2). Unlike the gateway,
//! the worker has no HTTP server of its own, so the exporter runs its own
//! listener rather than being rendered through an axum route.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

pub fn install_recorder(addr: SocketAddr) -> Result<(), anyhow::Error> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| anyhow::anyhow!("failed to install Prometheus exporter: {err}"))
}

pub fn record_job_completed(tool_slug: &str, status: &str, latency_ms: i64) {
    metrics::counter!(
        "relay_tasks_completed_total",
        "tool_slug" => tool_slug.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    metrics::histogram!(
        "relay_handler_latency_ms",
        "tool_slug" => tool_slug.to_string(),
    )
    .record(latency_ms as f64);
}
