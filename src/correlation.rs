// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Log ↔ span linkage.
//!
//! A log written while a span is active carries that span's ids in decimal
//! form (`dd.trace_id`, `dd.span_id`); the span itself carries them in hex.
//! Verification resolves every linked log to a delivered span.

use crate::error::CorrelationError;
use crate::model::{LogEvent, SpanEvent};
use crate::types::{SpanId, TraceId};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy)]
pub struct LogLink<'a> {
    pub log: &'a LogEvent,
    pub span: &'a SpanEvent,
}

/// Resolves every linked log in `logs` against `spans`.
///
/// Logs without trace ids are not linked and are skipped. Fails on the first
/// log whose ids are malformed or point at a span that is not in `spans`.
pub fn link_logs<'a>(spans: &'a [SpanEvent], logs: &'a [LogEvent]) -> Result<Vec<LogLink<'a>>, CorrelationError> {
    let by_id: FxHashMap<(TraceId, SpanId), &SpanEvent> = spans
        .iter()
        .map(|span| ((span.trace_id, span.span_id), span))
        .collect();

    let mut links = Vec::new();
    for log in logs {
        let Some(ids) = log.linked_ids()? else {
            continue;
        };
        match by_id.get(&ids) {
            Some(span) => links.push(LogLink { log, span }),
            None => {
                return Err(CorrelationError::UnknownSpan {
                    date: log.date,
                    trace_id: ids.0.to_decimal(),
                    span_id: ids.1.to_decimal(),
                })
            }
        }
    }

    Ok(links)
}
