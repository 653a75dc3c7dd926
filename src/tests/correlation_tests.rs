// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::correlation::link_logs;
use crate::error::CorrelationError;
use crate::model::{LogEvent, LogStatus, SpanEvent};
use crate::types::{SpanId, TraceId};

fn spans() -> Vec<SpanEvent> {
    let root = SpanEvent::root(TraceId(u64::MAX - 1), SpanId(0xdead_beef), "request", "api", 0).finished(100);
    let child = SpanEvent::child_of(&root, SpanId(7), "render", 10).finished(20);
    vec![root, child]
}

#[test]
fn test_linked_logs_resolve_to_their_span() {
    let spans = spans();
    let mut inside = LogEvent::new(15, LogStatus::Info, "rendering", "api", "ui");
    inside.link_to_span(&spans[1]);
    let outside = LogEvent::new(500, LogStatus::Debug, "idle", "api", "ui");

    let logs = vec![inside, outside];
    let links = link_logs(&spans, &logs).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].span.name, "render");
    assert_eq!(links[0].log.trace_id.as_deref(), Some("18446744073709551614"));
    assert_eq!(links[0].span.trace_id.to_hex(), "fffffffffffffffe");
}

#[test]
fn test_log_pointing_at_missing_span_fails() {
    let spans = spans();
    let mut log = LogEvent::new(15, LogStatus::Info, "orphan", "api", "ui");
    log.trace_id = Some("1".into());
    log.span_id = Some("2".into());

    let logs = vec![log];
    assert!(matches!(
        link_logs(&spans, &logs),
        Err(CorrelationError::UnknownSpan { date: 15, .. })
    ));
}

#[test]
fn test_malformed_ids_fail() {
    let spans = spans();
    let mut log = LogEvent::new(15, LogStatus::Info, "bad", "api", "ui");
    log.trace_id = Some("0x12".into());
    log.span_id = Some("7".into());

    let logs = vec![log];
    assert!(matches!(link_logs(&spans, &logs), Err(CorrelationError::MalformedId(_))));
}
