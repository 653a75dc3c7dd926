// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Relay: reads NDJSON event envelopes from stdin and ships them through
//! the pipeline.
//!
//! ```text
//! {"category":"logs","record":{...}}
//! {"category":"rum","record":{"type":"view",...}}
//! ```

use pulse_kernel::{Event, EventCategory};
use pulse_node::config::NodeConfig;
use pulse_node::diagnostics::TracingSink;
use pulse_node::upload::HttpUploader;
use pulse_node::{telemetry, Pipeline};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct Envelope {
    category: EventCategory,
    record: serde_json::Value,
}

fn decode_line(line: &str) -> pulse_node::Result<Event> {
    let envelope: Envelope = serde_json::from_str(line).map_err(pulse_kernel::PayloadError::from)?;
    let record = serde_json::to_vec(&envelope.record).map_err(pulse_kernel::PayloadError::from)?;
    Ok(Event::from_record(envelope.category, &record)?)
}

#[tokio::main]
async fn main() {
    telemetry::init_telemetry();

    let cfg = match NodeConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(2);
        }
    };
    tracing::info!("Starting pulse relay, storage at {:?}", cfg.storage_root);

    let uploader = match HttpUploader::new(cfg.upload.clone()) {
        Ok(uploader) => uploader,
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let pipeline = match Pipeline::start(&cfg, uploader, Arc::new(TracingSink)) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("Failed to start pipeline: {}", e);
            std::process::exit(1);
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut accepted = 0u64;
    let mut interrupted = false;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match decode_line(&line) {
                    Ok(event) => {
                        pipeline.write(&event);
                        accepted += 1;
                    }
                    Err(e) => tracing::warn!("Skipping malformed envelope: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                break;
            }
        }
    }

    tracing::info!("Input closed after {} events", accepted);
    pipeline.flush();

    if !interrupted {
        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        while pipeline.pending_segments() > 0 && tokio::time::Instant::now() < deadline {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(500)) => {}
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        let left = pipeline.pending_segments();
        if left > 0 {
            tracing::warn!("{} segments left on disk for the next run", left);
        }
    }

    pipeline.shutdown().await;
    tracing::debug!("Final metrics:\n{}", telemetry::get_metrics());
}
