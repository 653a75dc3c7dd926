// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Internal error signals.
//!
//! Producers never see queue or upload failures. They are reported here
//! instead, to whatever sink the host wires in.

use crate::storage::segment::SegmentId;
use pulse_kernel::EventCategory;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MaxAttempts,
    MaxAge,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MaxAttempts => f.write_str("max attempts reached"),
            DropReason::MaxAge => f.write_str("max age exceeded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An event could not be persisted and was discarded.
    WriteFailed { category: EventCategory, reason: String },
    /// The collector refused a batch with a non-retryable status.
    UploadRejected {
        category: EventCategory,
        segment: SegmentId,
        status: u16,
    },
    BatchDropped {
        category: EventCategory,
        segment: SegmentId,
        reason: DropReason,
        attempts: u32,
    },
    SegmentCorrupted {
        category: EventCategory,
        segment: SegmentId,
        reason: String,
    },
    SegmentsPruned {
        category: EventCategory,
        count: usize,
        bytes: u64,
    },
}

impl Diagnostic {
    pub fn category(&self) -> EventCategory {
        match self {
            Diagnostic::WriteFailed { category, .. }
            | Diagnostic::UploadRejected { category, .. }
            | Diagnostic::BatchDropped { category, .. }
            | Diagnostic::SegmentCorrupted { category, .. }
            | Diagnostic::SegmentsPruned { category, .. } => *category,
        }
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

pub type SharedSink = Arc<dyn DiagnosticSink>;

/// Forwards diagnostics to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::WriteFailed { category, reason } => {
                tracing::error!(category = %category, "Dropping event, write failed: {}", reason);
            }
            Diagnostic::UploadRejected { category, segment, status } => {
                tracing::error!(category = %category, segment = %segment, status, "Collector rejected batch, dropping");
            }
            Diagnostic::BatchDropped { category, segment, reason, attempts } => {
                tracing::warn!(category = %category, segment = %segment, attempts, "Dropping batch: {}", reason);
            }
            Diagnostic::SegmentCorrupted { category, segment, reason } => {
                tracing::error!(category = %category, segment = %segment, "Dropping corrupted segment: {}", reason);
            }
            Diagnostic::SegmentsPruned { category, count, bytes } => {
                tracing::warn!(category = %category, count, bytes, "Pruned segments without upload");
            }
        }
    }
}

/// Keeps every diagnostic in memory. Used by tests and the verifier.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}
