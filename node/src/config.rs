// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Node configuration.
//!
//! Every knob has a conservative default. `NodeConfig::from_env` overrides
//! them from `PULSE_*` variables for the relay binary.

use crate::errors::{NodeError, Result};
use pulse_kernel::EventCategory;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Segment rotation, record limits and on-disk retention for one category.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// A segment closes once its file reaches this size.
    pub max_segment_size: u64,
    /// A segment closes once this much time has passed since its first write.
    pub max_segment_age: Duration,
    pub max_events_per_segment: usize,
    /// Larger records are rejected at the writer.
    pub max_record_size: usize,
    /// Closed segments older than this are pruned without upload.
    pub max_retention: Duration,
    /// Oldest closed segments are pruned while the directory is above this.
    pub max_directory_size: u64,
    /// fsync after every append instead of only on close.
    pub sync_writes: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_segment_size: 4 * 1024 * 1024,
            max_segment_age: Duration::from_millis(4_750),
            max_events_per_segment: 500,
            max_record_size: 512 * 1024,
            max_retention: Duration::from_secs(18 * 60 * 60),
            max_directory_size: 512 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// Bounds and factors of the adaptive upload interval.
#[derive(Debug, Clone)]
pub struct DelayConfig {
    pub initial: Duration,
    pub min: Duration,
    pub max: Duration,
    /// Applied after a delivery when more segments are waiting.
    pub decrease_factor: f64,
    /// Applied after a retryable failure.
    pub backoff_multiplier: f64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            min: Duration::from_secs(1),
            max: Duration::from_secs(20 * 60),
            decrease_factor: 0.9,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// A batch that failed this many times is dropped.
    pub max_attempts: u32,
    /// A batch whose segment is older than this is dropped without upload.
    pub max_batch_age: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            max_batch_age: Duration::from_secs(18 * 60 * 60),
        }
    }
}

/// Collector intake URL per category.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub logs: String,
    pub traces: String,
    pub rum: String,
}

impl Endpoints {
    pub fn for_category(&self, category: EventCategory) -> &str {
        match category {
            EventCategory::Logs => &self.logs,
            EventCategory::Traces => &self.traces,
            EventCategory::Rum => &self.rum,
        }
    }

    /// Same base URL for every category, e.g. a local mock collector.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            logs: format!("{}/v1/input/logs", base),
            traces: format!("{}/v1/input/traces", base),
            rum: format!("{}/v1/input/rum", base),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::with_base("http://127.0.0.1:8126")
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub endpoints: Endpoints,
    pub client_token: String,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub delay: DelayConfig,
    pub retry: RetryPolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            client_token: String::new(),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("pulse-node/{}", env!("CARGO_PKG_VERSION")),
            delay: DelayConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Parent of the per-category queue directories.
    pub storage_root: PathBuf,
    pub queue: QueueConfig,
    pub upload: UploadConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("pulse-data"),
            queue: QueueConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by `PULSE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(dir) = lookup("PULSE_STORAGE_DIR") {
            cfg.storage_root = PathBuf::from(dir);
        }
        if let Some(base) = lookup("PULSE_ENDPOINT") {
            cfg.upload.endpoints = Endpoints::with_base(&base);
        }
        if let Some(url) = lookup("PULSE_LOGS_ENDPOINT") {
            cfg.upload.endpoints.logs = url;
        }
        if let Some(url) = lookup("PULSE_TRACES_ENDPOINT") {
            cfg.upload.endpoints.traces = url;
        }
        if let Some(url) = lookup("PULSE_RUM_ENDPOINT") {
            cfg.upload.endpoints.rum = url;
        }
        if let Some(token) = lookup("PULSE_CLIENT_TOKEN") {
            cfg.upload.client_token = token;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "PULSE_REQUEST_TIMEOUT_SECS")? {
            cfg.upload.request_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var(&lookup, "PULSE_MAX_ATTEMPTS")? {
            cfg.upload.retry.max_attempts = attempts;
        }
        if let Some(bytes) = parse_var(&lookup, "PULSE_MAX_SEGMENT_SIZE")? {
            cfg.queue.max_segment_size = bytes;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "PULSE_MAX_SEGMENT_AGE_MS")? {
            cfg.queue.max_segment_age = Duration::from_millis(ms);
        }
        if let Some(bytes) = parse_var(&lookup, "PULSE_MAX_DIRECTORY_SIZE")? {
            cfg.queue.max_directory_size = bytes;
        }
        if let Some(sync) = parse_var(&lookup, "PULSE_SYNC_WRITES")? {
            cfg.queue.sync_writes = sync;
        }

        Ok(cfg)
    }

    pub fn queue_dir(&self, category: EventCategory) -> PathBuf {
        self.storage_root.join(category.as_str())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| NodeError::Config(format!("{} has invalid value `{}`", key, raw))),
    }
}
