// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use crate::event::EventCategory;
use crate::model::rum::RumEventKind;
use thiserror::Error;

/// A structural violation found while rebuilding sessions from an event stream.
///
/// Every variant names the offending event (session, view and kind) so a
/// failing verification run points straight at the producer bug.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("bad session plan: {kind} event in session {session_id} (view {view_id}) has plan {found:?}, expected {expected}")]
    BadSessionPlan {
        kind: RumEventKind,
        session_id: String,
        view_id: String,
        found: Option<u8>,
        expected: u8,
    },

    #[error("duplicate resource id: `{resource_id}` appears more than once in session {session_id}")]
    DuplicateResourceId { session_id: String, resource_id: String },

    #[error("unlinked event: {kind} event in session {session_id} references view {view_id} which was never reported")]
    UnlinkedEvent {
        kind: RumEventKind,
        session_id: String,
        view_id: String,
    },

    #[error("inconsistent view identity: view {view_id} has {field} `{found}` but earlier updates used `{expected}`")]
    InconsistentViewIdentity {
        view_id: String,
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("inactive first view update: the earliest update of view {view_id} (document version {document_version}) is not active")]
    InactiveFirstUpdate { view_id: String, document_version: u64 },

    #[error("view reactivated after closing: view {view_id} is active again at document version {document_version}")]
    ViewReactivated { view_id: String, document_version: u64 },

    #[error("missing required field: {kind} event in session {session_id} (view {view_id}) has no `{field}`")]
    MissingField {
        kind: RumEventKind,
        session_id: String,
        view_id: String,
        field: &'static str,
    },
}

impl ConsistencyError {
    /// Short, stable name of the violated invariant.
    pub fn reason(&self) -> &'static str {
        match self {
            ConsistencyError::BadSessionPlan { .. } => "bad session plan",
            ConsistencyError::DuplicateResourceId { .. } => "duplicate resource id",
            ConsistencyError::UnlinkedEvent { .. } => "unlinked event",
            ConsistencyError::InconsistentViewIdentity { .. } => "inconsistent view identity",
            ConsistencyError::InactiveFirstUpdate { .. } => "inactive first view update",
            ConsistencyError::ViewReactivated { .. } => "view reactivated after closing",
            ConsistencyError::MissingField { .. } => "missing required field",
        }
    }
}

/// Log/span linkage failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("malformed tracing id: `{0}`")]
    MalformedId(String),

    #[error("log at {date} carries only one of `dd.trace_id` / `dd.span_id`")]
    PartialLink { date: u64 },

    #[error("log at {date} references trace {trace_id} / span {span_id} which was never delivered")]
    UnknownSpan {
        date: u64,
        trace_id: String,
        span_id: String,
    },
}

/// Encoding and decoding of collector payloads and queue records.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("{event} event cannot be stored in the {category} queue")]
    CategoryMismatch {
        event: EventCategory,
        category: EventCategory,
    },
}

pub type ConsistencyResult<T> = Result<T, ConsistencyError>;
pub type PayloadResult<T> = Result<T, PayloadError>;
