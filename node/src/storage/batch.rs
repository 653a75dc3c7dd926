// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Read/write boundary between the queue and its upload worker.

use crate::diagnostics::Diagnostic;
use crate::storage::queue::{PersistentQueue, QueueError, Result};
use crate::storage::segment::{SegmentError, SegmentId};
use pulse_kernel::payload::{self, PayloadFormat};
use pulse_kernel::{Event, EventCategory};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Producer handle. Cheap to clone, safe to share across threads.
#[derive(Clone)]
pub struct EventWriter {
    queue: Arc<PersistentQueue>,
}

impl EventWriter {
    pub fn new(queue: Arc<PersistentQueue>) -> Self {
        Self { queue }
    }

    pub fn category(&self) -> EventCategory {
        self.queue.category()
    }

    /// Never fails and never blocks beyond a buffered local write.
    pub fn write(&self, event: &Event) {
        self.queue.append(event);
    }
}

/// One closed segment on its way to the collector.
#[derive(Debug, Clone)]
pub struct Batch {
    pub segment: SegmentId,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    pub records: Vec<Vec<u8>>,
}

impl Batch {
    pub fn created_at(&self) -> SystemTime {
        self.segment.created_at()
    }

    pub fn age(&self, now: SystemTime) -> Duration {
        self.segment.age(now)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Request body in the collector format.
    pub fn body(&self, format: PayloadFormat) -> Vec<u8> {
        payload::encode(format, &self.records)
    }
}

/// Yields the oldest closed segment as a batch and records its fate.
///
/// Attempt counts live here, in memory. A restart resets them.
pub struct BatchReader {
    queue: Arc<PersistentQueue>,
    attempts: HashMap<SegmentId, u32>,
}

impl BatchReader {
    pub fn new(queue: Arc<PersistentQueue>) -> Self {
        Self {
            queue,
            attempts: HashMap::new(),
        }
    }

    pub fn queue(&self) -> &Arc<PersistentQueue> {
        &self.queue
    }

    /// Oldest readable closed segment.
    ///
    /// Corrupted or empty segments are dropped on the way, with a
    /// diagnostic for the corrupted ones. Undecodable trailing bytes are
    /// reported too; the records before them are still delivered.
    pub fn next_batch(&mut self) -> Result<Option<Batch>> {
        let closed = self.queue.closed_segments()?;
        // Segments pruned or deleted behind the reader's back.
        self.attempts.retain(|segment, _| closed.binary_search(segment).is_ok());

        for segment in closed {
            match self.queue.read(segment) {
                Ok(data) if data.torn_bytes > 0 => {
                    self.report_corrupted(
                        segment,
                        format!("{} undecodable bytes after {} records", data.torn_bytes, data.records.len()),
                    );
                    if data.records.is_empty() {
                        self.forget(segment)?;
                        continue;
                    }
                    return Ok(Some(Batch {
                        segment,
                        attempts: self.attempts(segment),
                        records: data.records,
                    }));
                }
                Ok(data) if data.records.is_empty() => {
                    tracing::debug!("Removing empty segment {}", segment);
                    self.forget(segment)?;
                }
                Ok(data) => {
                    return Ok(Some(Batch {
                        segment,
                        attempts: self.attempts(segment),
                        records: data.records,
                    }));
                }
                Err(QueueError::Segment(SegmentError::Io(e))) if e.kind() == std::io::ErrorKind::NotFound => {
                    continue;
                }
                Err(QueueError::Segment(e)) => {
                    self.report_corrupted(segment, e.to_string());
                    self.forget(segment)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    pub fn mark_delivered(&mut self, batch: &Batch) -> Result<()> {
        self.forget(batch.segment)
    }

    pub fn mark_dropped(&mut self, batch: &Batch) -> Result<()> {
        self.forget(batch.segment)
    }

    /// Keeps the segment and returns the new attempt count.
    pub fn mark_failed(&mut self, batch: &Batch) -> u32 {
        let attempts = self.attempts.entry(batch.segment).or_insert(0);
        *attempts += 1;
        *attempts
    }

    pub fn attempts(&self, segment: SegmentId) -> u32 {
        self.attempts.get(&segment).copied().unwrap_or(0)
    }

    fn report_corrupted(&self, segment: SegmentId, reason: String) {
        self.queue.diagnostics().report(Diagnostic::SegmentCorrupted {
            category: self.queue.category(),
            segment,
            reason,
        });
    }

    fn forget(&mut self, segment: SegmentId) -> Result<()> {
        self.attempts.remove(&segment);
        self.queue.delete(segment)
    }
}
