// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Loading recorded collector bodies and queue directories.

use anyhow::{Context, Result};
use pulse_kernel::payload::{self, PayloadFormat};
use pulse_kernel::EventCategory;
use pulse_node::storage::segment::{self, SegmentId, SegmentState};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Decodes a recorded body, NDJSON or JSON array, whichever it looks like.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let format = PayloadFormat::detect(&body);
    payload::decode(format, &body).with_context(|| format!("Failed to decode {} as {:?}", path.display(), format))
}

#[derive(Debug, Serialize)]
pub struct SegmentSummary {
    pub segment: u64,
    pub state: &'static str,
    pub bytes: u64,
    pub records: usize,
    pub torn_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub payloads: Vec<Vec<u8>>,
}

/// Every segment file of one category directory, oldest first. Read-only:
/// stray open segments are reported, not closed.
pub fn scan_category(dir: &Path, category: EventCategory) -> Result<Vec<SegmentSummary>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let Some((id, state)) = name.to_str().and_then(SegmentId::parse) else {
            continue;
        };
        found.push((id, state, entry.path()));
    }
    found.sort_by_key(|(id, _, _)| *id);

    let mut summaries = Vec::with_capacity(found.len());
    for (id, state, path) in found {
        let bytes = fs::metadata(&path)?.len();
        let state_name = match state {
            SegmentState::Open => "open",
            SegmentState::Closed => "closed",
        };
        let summary = match segment::read_segment(&path, category) {
            Ok(data) => SegmentSummary {
                segment: id.0,
                state: state_name,
                bytes,
                records: data.records.len(),
                torn_bytes: data.torn_bytes,
                error: None,
                payloads: data.records,
            },
            Err(e) => SegmentSummary {
                segment: id.0,
                state: state_name,
                bytes,
                records: 0,
                torn_bytes: 0,
                error: Some(e.to_string()),
                payloads: Vec::new(),
            },
        };
        summaries.push(summary);
    }
    Ok(summaries)
}
