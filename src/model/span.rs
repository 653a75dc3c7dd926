// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Span records as shipped to the traces intake.

use crate::types::{SpanId, Timestamp, TraceId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Metric set to 1 on spans without a parent.
pub const TOP_LEVEL_METRIC: &str = "_top_level";

pub const DEFAULT_SPAN_TYPE: &str = "custom";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    /// `"0"` on the wire for root spans.
    #[serde(serialize_with = "serialize_parent", deserialize_with = "deserialize_parent")]
    pub parent_id: Option<SpanId>,
    pub name: String,
    pub resource: String,
    pub service: String,
    #[serde(rename = "type")]
    pub span_type: String,
    pub start: Timestamp,
    pub duration: u64,
    pub error: u8,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl SpanEvent {
    /// A span with no parent. Marked top-level.
    pub fn root(trace_id: TraceId, span_id: SpanId, name: impl Into<String>, service: impl Into<String>, start: Timestamp) -> Self {
        let name = name.into();
        let mut metrics = BTreeMap::new();
        metrics.insert(TOP_LEVEL_METRIC.to_string(), 1.0);
        Self {
            trace_id,
            span_id,
            parent_id: None,
            resource: name.clone(),
            name,
            service: service.into(),
            span_type: DEFAULT_SPAN_TYPE.to_string(),
            start,
            duration: 0,
            error: 0,
            meta: BTreeMap::new(),
            metrics,
        }
    }

    /// A span nested under `parent`, sharing its trace.
    pub fn child_of(parent: &SpanEvent, span_id: SpanId, name: impl Into<String>, start: Timestamp) -> Self {
        let name = name.into();
        Self {
            trace_id: parent.trace_id,
            span_id,
            parent_id: Some(parent.span_id),
            resource: name.clone(),
            name,
            service: parent.service.clone(),
            span_type: DEFAULT_SPAN_TYPE.to_string(),
            start,
            duration: 0,
            error: 0,
            meta: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn finished(mut self, duration: u64) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

fn serialize_parent<S: Serializer>(parent: &Option<SpanId>, serializer: S) -> Result<S::Ok, S::Error> {
    match parent {
        Some(id) => id.serialize(serializer),
        None => serializer.serialize_str("0"),
    }
}

fn deserialize_parent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<SpanId>, D::Error> {
    let id = SpanId::deserialize(deserializer)?;
    Ok(if id.0 == 0 { None } else { Some(id) })
}
