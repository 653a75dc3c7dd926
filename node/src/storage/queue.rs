// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Persistent, file-segmented event queue for one category.
//!
//! # Contract
//! - `append` serializes and frames outside the lock, then holds the lock
//!   only for rotation bookkeeping and a buffered write
//! - `closed_segments` is recomputed from the directory on every call
//! - `delete` is idempotent
//! - Only the queue opens, writes and closes segments. Readers see closed
//!   segments only.

use crate::config::QueueConfig;
use crate::diagnostics::{Diagnostic, SharedSink};
use crate::storage::segment::{self, now_ms, SegmentData, SegmentError, SegmentId, SegmentState, SegmentWriter};
use crate::telemetry;
use pulse_kernel::{Event, EventCategory, PayloadError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Segment error: {0}")]
    Segment(#[from] SegmentError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Record of {size} bytes exceeds the {limit} byte limit")]
    RecordTooLarge { size: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, QueueError>;

struct OpenSegment {
    writer: Option<SegmentWriter>,
    last_id: u64,
}

impl OpenSegment {
    /// Monotonic id even when two segments open in the same millisecond.
    fn next_id(&mut self) -> SegmentId {
        let id = now_ms().max(self.last_id + 1);
        self.last_id = id;
        SegmentId(id)
    }
}

pub struct PersistentQueue {
    category: EventCategory,
    dir: PathBuf,
    config: QueueConfig,
    open: Mutex<OpenSegment>,
    diagnostics: SharedSink,
}

impl PersistentQueue {
    /// Opens (or creates) the queue directory and closes segments a previous
    /// process left open.
    pub fn open(dir: impl AsRef<Path>, category: EventCategory, config: QueueConfig, diagnostics: SharedSink) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut last_id = 0;
        for (id, state) in scan(&dir)? {
            last_id = last_id.max(id.0);
            if state == SegmentState::Open {
                tracing::warn!("Closing segment {} left open by a previous run", id);
                segment::recover(&dir, id, category)?;
            }
        }

        tracing::info!("Queue for {} opened at {:?}", category, dir);

        Ok(Self {
            category,
            dir,
            config,
            open: Mutex::new(OpenSegment { writer: None, last_id }),
            diagnostics,
        })
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Fire-and-forget append. Failures become diagnostics, never errors.
    pub fn append(&self, event: &Event) {
        if let Err(e) = self.try_append(event) {
            metrics::counter!(telemetry::WRITE_FAILURES, 1, "category" => self.category.as_str());
            self.diagnostics.report(Diagnostic::WriteFailed {
                category: self.category,
                reason: e.to_string(),
            });
        }
    }

    pub fn try_append(&self, event: &Event) -> Result<()> {
        event.expect_category(self.category)?;
        let record = event.to_record()?;
        if record.len() > self.config.max_record_size {
            return Err(QueueError::RecordTooLarge {
                size: record.len(),
                limit: self.config.max_record_size,
            });
        }
        let frame = segment::encode_frame(&record);

        let mut open = self.lock();

        if let Some(writer) = open.writer.as_ref() {
            let would_overflow = writer.event_count() > 0
                && writer.bytes_written() + frame.len() as u64 > self.config.max_segment_size;
            if would_overflow || self.is_expired(writer) {
                self.close_current(&mut open)?;
            }
        }

        if open.writer.is_none() {
            let id = open.next_id();
            open.writer = Some(SegmentWriter::create(&self.dir, id, self.category)?);
            tracing::debug!("Opened segment {} for {}", id, self.category);
        }

        if let Some(writer) = open.writer.as_mut() {
            let written = writer.append_frame(&frame).and_then(|()| {
                if self.config.sync_writes {
                    writer.sync()
                } else {
                    Ok(())
                }
            });
            if let Err(e) = written {
                self.abandon_current(&mut open);
                return Err(e.into());
            }
            let full = writer.bytes_written() >= self.config.max_segment_size
                || writer.event_count() >= self.config.max_events_per_segment;
            if full {
                self.close_current(&mut open)?;
            }
        }

        metrics::counter!(telemetry::EVENTS_WRITTEN, 1, "category" => self.category.as_str());
        Ok(())
    }

    /// Closes the open segment, if any, making it eligible for upload.
    pub fn flush(&self) -> Result<Option<SegmentId>> {
        let mut open = self.lock();
        self.close_current(&mut open)
    }

    /// Closes the open segment only if it has outlived `max_segment_age`.
    pub fn rotate_expired(&self) -> Result<Option<SegmentId>> {
        let mut open = self.lock();
        let expired = open.writer.as_ref().map(|w| self.is_expired(w)).unwrap_or(false);
        if expired {
            self.close_current(&mut open)
        } else {
            Ok(None)
        }
    }

    /// Closed segments, oldest first.
    pub fn closed_segments(&self) -> Result<Vec<SegmentId>> {
        Ok(scan(&self.dir)?
            .into_iter()
            .filter(|(_, state)| *state == SegmentState::Closed)
            .map(|(id, _)| id)
            .collect())
    }

    pub fn read(&self, id: SegmentId) -> Result<SegmentData> {
        Ok(segment::read_segment(&self.segment_path(id), self.category)?)
    }

    /// Deleting a missing segment is a no-op.
    pub fn delete(&self, id: SegmentId) -> Result<()> {
        match fs::remove_file(self.segment_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes closed segments past `max_retention`, then oldest-first while
    /// the directory exceeds `max_directory_size`. Returns the count removed.
    pub fn prune(&self) -> Result<usize> {
        let now = SystemTime::now();
        let mut segments = Vec::new();
        for id in self.closed_segments()? {
            match fs::metadata(self.segment_path(id)) {
                Ok(meta) => segments.push((id, meta.len())),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let mut total: u64 = segments.iter().map(|(_, len)| len).sum();
        if let Some(writer) = self.lock().writer.as_ref() {
            total += writer.bytes_written();
        }

        let mut pruned = 0;
        let mut pruned_bytes = 0;
        for (id, len) in segments {
            let expired = id.age(now) > self.config.max_retention;
            let over_cap = total > self.config.max_directory_size;
            if !expired && !over_cap {
                break;
            }
            self.delete(id)?;
            total = total.saturating_sub(len);
            pruned += 1;
            pruned_bytes += len;
        }

        if pruned > 0 {
            metrics::counter!(telemetry::SEGMENTS_PRUNED, pruned as u64, "category" => self.category.as_str());
            self.diagnostics.report(Diagnostic::SegmentsPruned {
                category: self.category,
                count: pruned,
                bytes: pruned_bytes,
            });
        }
        Ok(pruned)
    }

    pub fn segment_path(&self, id: SegmentId) -> PathBuf {
        self.dir.join(id.file_name(SegmentState::Closed))
    }

    pub(crate) fn diagnostics(&self) -> &SharedSink {
        &self.diagnostics
    }

    fn is_expired(&self, writer: &SegmentWriter) -> bool {
        writer.id().age(SystemTime::now()) >= self.config.max_segment_age
    }

    fn close_current(&self, open: &mut OpenSegment) -> Result<Option<SegmentId>> {
        match open.writer.take() {
            Some(writer) => {
                let count = writer.event_count();
                let id = writer.close()?;
                tracing::debug!("Closed segment {} for {} ({} events)", id, self.category, count);
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Drops the open segment after a failed write. The next append starts
    /// a fresh one.
    fn abandon_current(&self, open: &mut OpenSegment) {
        if let Some(writer) = open.writer.take() {
            let id = writer.id();
            match writer.abandon() {
                Ok(kept) => tracing::warn!(
                    category = %self.category,
                    segment = %id,
                    kept,
                    "Abandoned segment after a write failure"
                ),
                Err(e) => tracing::error!("Failed to seal abandoned segment {}: {}", id, e),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, OpenSegment> {
        match self.open.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for PersistentQueue {
    fn drop(&mut self) {
        let mut open = self.lock();
        if let Err(e) = self.close_current(&mut open) {
            tracing::warn!("Failed to close open segment for {}: {}", self.category, e);
        }
    }
}

/// Every segment file in `dir`, sorted by id.
fn scan(dir: &Path) -> io::Result<Vec<(SegmentId, SegmentState)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(parsed) = entry.file_name().to_str().and_then(SegmentId::parse) {
            found.push(parsed);
        }
    }
    found.sort_by_key(|(id, _)| *id);
    Ok(found)
}
