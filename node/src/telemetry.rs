// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const EVENTS_WRITTEN: &str = "pulse_events_written_total";
pub const WRITE_FAILURES: &str = "pulse_write_failures_total";
pub const BATCHES_DELIVERED: &str = "pulse_batches_delivered_total";
pub const BATCHES_RETRIED: &str = "pulse_batches_retried_total";
pub const BATCHES_REJECTED: &str = "pulse_batches_rejected_total";
pub const BATCHES_DROPPED: &str = "pulse_batches_dropped_total";
pub const SEGMENTS_PRUNED: &str = "pulse_segments_pruned_total";
pub const UPLOAD_DURATION: &str = "pulse_upload_duration_seconds";

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pulse_node=info"));
    if tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }

    // 2. Metrics (Prometheus)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("Metrics recorder not installed: {}", e),
    }

    metrics::describe_counter!(EVENTS_WRITTEN, "Events persisted to a queue segment");
    metrics::describe_counter!(WRITE_FAILURES, "Events dropped because they could not be persisted");
    metrics::describe_counter!(BATCHES_DELIVERED, "Batches accepted by the collector");
    metrics::describe_counter!(BATCHES_RETRIED, "Upload attempts that failed with a retryable outcome");
    metrics::describe_counter!(BATCHES_REJECTED, "Batches refused by the collector with a 4xx status");
    metrics::describe_counter!(BATCHES_DROPPED, "Batches dropped after max attempts or max age");
    metrics::describe_counter!(SEGMENTS_PRUNED, "Closed segments deleted without upload");
    metrics::describe_histogram!(UPLOAD_DURATION, "Time taken by one upload attempt");
}

/// Prometheus exposition text of every pulse metric recorded so far.
pub fn get_metrics() -> String {
    match PROM_HANDLE.get() {
        Some(handle) => handle.render(),
        None => "# metrics not initialized".to_string(),
    }
}
