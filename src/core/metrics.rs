use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    if PROM_HANDLE.get().is_none() {
        let handle = PrometheusBuilder::new().install_recorder()?;
        let _ = PROM_HANDLE.set(handle);
        describe();
    }
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    metrics::describe_counter!("attempts_started_total", "Attempts created by start");
    metrics::describe_counter!("attempts_resumed_total", "Start calls that resumed a live attempt");
    metrics::describe_counter!("attempts_finalized_total", "Attempts scored, labelled by mode");
    metrics::describe_counter!(
        "auto_submit_noop_total",
        "Auto-submits that found the attempt already completed"
    );
    metrics::describe_counter!(
        "auto_submit_sweep_finalized_total",
        "Overdue attempts finalized by the durable sweep"
    );
    metrics::describe_counter!("http_requests_total", "HTTP responses by status");
    metrics::describe_histogram!("http_request_duration_seconds", "HTTP latency by status");
}
