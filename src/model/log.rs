// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Log records.

use crate::error::CorrelationError;
use crate::model::span::SpanEvent;
use crate::types::{SpanId, Timestamp, TraceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogStatus {
    Debug,
    Info,
    Notice,
    Warn,
    Error,
    Critical,
}

/// A single log line as delivered to the logs intake.
///
/// `attributes` holds user attributes and is flattened into the top-level
/// JSON object, so unknown keys survive a decode/encode cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub date: Timestamp,
    pub status: LogStatus,
    pub message: String,
    pub service: String,
    #[serde(rename = "logger.name")]
    pub logger_name: String,
    #[serde(rename = "logger.thread_name", default, skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
    #[serde(rename = "ddtags", default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(rename = "dd.trace_id", default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(rename = "dd.span_id", default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl LogEvent {
    pub fn new(
        date: Timestamp,
        status: LogStatus,
        message: impl Into<String>,
        service: impl Into<String>,
        logger_name: impl Into<String>,
    ) -> Self {
        Self {
            date,
            status,
            message: message.into(),
            service: service.into(),
            logger_name: logger_name.into(),
            thread_name: None,
            tags: None,
            trace_id: None,
            span_id: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Stamps the ids of the span that was active when this log was emitted.
    /// Logs use the decimal form of both ids.
    pub fn link_to_span(&mut self, span: &SpanEvent) {
        self.trace_id = Some(span.trace_id.to_decimal());
        self.span_id = Some(span.span_id.to_decimal());
    }

    /// Parsed span linkage, `None` for logs emitted outside any span.
    pub fn linked_ids(&self) -> Result<Option<(TraceId, SpanId)>, CorrelationError> {
        match (&self.trace_id, &self.span_id) {
            (None, None) => Ok(None),
            (Some(trace), Some(span)) => Ok(Some((
                TraceId::from_decimal(trace)?,
                SpanId::from_decimal(span)?,
            ))),
            _ => Err(CorrelationError::PartialLink { date: self.date }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_uppercase() {
        let log = LogEvent::new(1, LogStatus::Warn, "disk low", "app", "main");
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["status"], "WARN");
        assert_eq!(json["logger.name"], "main");
        assert!(json.get("dd.trace_id").is_none());
    }

    #[test]
    fn test_attributes_flatten_to_top_level() {
        let log = LogEvent::new(1, LogStatus::Info, "download progress", "app", "main")
            .with_attribute("progress", 0.99);
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["progress"], 0.99);

        let back: LogEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, log);
    }

    #[test]
    fn test_partial_link_is_an_error() {
        let mut log = LogEvent::new(7, LogStatus::Info, "m", "s", "l");
        log.trace_id = Some("12".into());
        assert_eq!(log.linked_ids(), Err(CorrelationError::PartialLink { date: 7 }));
    }
}
