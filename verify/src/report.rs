// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! JSON summaries printed by the verifier.

use pulse_kernel::correlation::LogLink;
use pulse_kernel::session::{Session, ViewVisit};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct VisitSummary {
    pub view_id: String,
    pub name: String,
    pub path: String,
    pub started_at: u64,
    pub updates: usize,
    pub actions: usize,
    pub resources: usize,
    pub errors: usize,
    pub closed: bool,
}

impl From<&ViewVisit> for VisitSummary {
    fn from(visit: &ViewVisit) -> Self {
        Self {
            view_id: visit.view_id().to_string(),
            name: visit.name().to_string(),
            path: visit.path().to_string(),
            started_at: visit.started_at(),
            updates: visit.view_events().len(),
            actions: visit.action_events().len(),
            resources: visit.resource_events().len(),
            errors: visit.error_events().len(),
            closed: visit.is_closed(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: u64,
    pub events: usize,
    pub visits: Vec<VisitSummary>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id().to_string(),
            started_at: session.started_at(),
            events: session.event_count(),
            visits: session.view_visits().iter().map(VisitSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionsReport {
    pub sessions: Vec<SessionSummary>,
}

impl SessionsReport {
    pub fn new(sessions: &[Session]) -> Self {
        Self {
            sessions: sessions.iter().map(SessionSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LinksReport {
    pub spans: usize,
    pub logs: usize,
    pub linked: usize,
    /// Spans with at least one linked log, in first-seen order.
    pub by_span: Vec<SpanLogs>,
}

#[derive(Debug, Serialize)]
pub struct SpanLogs {
    pub trace_id: String,
    pub span_id: String,
    pub name: String,
    pub logs: usize,
}

impl LinksReport {
    pub fn new(spans: usize, logs: usize, links: &[LogLink<'_>]) -> Self {
        let mut by_span: Vec<SpanLogs> = Vec::new();
        for link in links {
            let trace_id = link.span.trace_id.to_string();
            let span_id = link.span.span_id.to_string();
            match by_span
                .iter_mut()
                .find(|s| s.trace_id == trace_id && s.span_id == span_id)
            {
                Some(entry) => entry.logs += 1,
                None => by_span.push(SpanLogs {
                    trace_id,
                    span_id,
                    name: link.span.name.clone(),
                    logs: 1,
                }),
            }
        }
        Self {
            spans,
            logs,
            linked: links.len(),
            by_span,
        }
    }
}

/// RUM sessions rebuilt from a queue directory, or why they could not be.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RumCheck {
    Consistent { sessions: usize, visits: usize },
    Inconsistent { reason: &'static str, detail: String },
    Undecodable { detail: String },
}
