// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Upload worker.
//!
//! # State Machine
//! ```text
//! Idle --tick--> Uploading --+--> Idle             (delivered, rejected, dropped)
//!                            +--> Backoff          (retryable failure)
//! Backoff --tick--> Uploading ...
//! ```
//!
//! # Invariants
//! - One worker per category, one attempt per tick
//! - Never two attempts in flight for the same category
//! - On cancellation the in-flight attempt completes and is recorded, then
//!   the loop exits without scheduling another

use crate::config::{DelayConfig, RetryPolicy};
use crate::diagnostics::{Diagnostic, DropReason};
use crate::storage::batch::{Batch, BatchReader};
use crate::storage::queue::PersistentQueue;
use crate::storage::segment::{now_ms, SegmentId};
use crate::telemetry;
use crate::upload::client::{UploadRequest, Uploader};
use crate::upload::delay::UploadDelay;
use crate::upload::status::{UploadResponse, UploadStatus};
use pulse_kernel::EventCategory;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Uploading,
    Backoff,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No closed segment was waiting.
    NoData,
    Delivered { segment: SegmentId, more_pending: bool },
    Retried { segment: SegmentId, attempts: u32, response: UploadResponse },
    Rejected { segment: SegmentId, status: u16 },
    Dropped { segment: SegmentId, reason: DropReason },
}

pub struct UploadWorker<U> {
    category: EventCategory,
    reader: BatchReader,
    uploader: U,
    delay: UploadDelay,
    retry: RetryPolicy,
    state: WorkerState,
}

impl<U: Uploader> UploadWorker<U> {
    pub fn new(queue: Arc<PersistentQueue>, uploader: U, delay: DelayConfig, retry: RetryPolicy) -> Self {
        Self {
            category: queue.category(),
            reader: BatchReader::new(queue),
            uploader,
            delay: UploadDelay::new(delay),
            retry,
            state: WorkerState::Idle,
        }
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Wait before the next tick.
    pub fn current_delay(&self) -> Duration {
        self.delay.current()
    }

    pub fn attempts(&self, segment: SegmentId) -> u32 {
        self.reader.attempts(segment)
    }

    /// Sleeps, ticks, repeats until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("Upload worker for {} started", self.category);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.delay.current()) => {}
            }

            // Not raced against `cancel`: an attempt in flight is observed.
            let outcome = self.tick().await;
            tracing::trace!("Upload tick for {}: {:?}", self.category, outcome);

            if cancel.is_cancelled() {
                break;
            }
        }
        tracing::info!("Upload worker for {} stopped", self.category);
    }

    /// One scheduling step: at most one delivery attempt.
    pub async fn tick(&mut self) -> TickOutcome {
        let queue = self.reader.queue().clone();
        if let Err(e) = queue.rotate_expired() {
            tracing::warn!("Failed to rotate {} segment: {}", self.category, e);
        }
        if let Err(e) = queue.prune() {
            tracing::warn!("Failed to prune {} queue: {}", self.category, e);
        }

        let batch = match self.reader.next_batch() {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                self.state = WorkerState::Idle;
                return TickOutcome::NoData;
            }
            Err(e) => {
                tracing::warn!("Failed to read {} batch: {}", self.category, e);
                self.state = WorkerState::Idle;
                return TickOutcome::NoData;
            }
        };

        if batch.age(SystemTime::now()) > self.retry.max_batch_age {
            return self.drop_batch(&batch, DropReason::MaxAge);
        }

        self.state = WorkerState::Uploading;
        let request = UploadRequest {
            category: self.category,
            format: self.category.payload_format(),
            body: batch.body(self.category.payload_format()),
            event_count: batch.len(),
            batch_time: now_ms(),
        };

        let started = Instant::now();
        let response = self.uploader.upload(request).await;
        metrics::histogram!(telemetry::UPLOAD_DURATION, started.elapsed().as_secs_f64(), "category" => self.category.as_str());

        match UploadStatus::classify(&response) {
            UploadStatus::Delivered => self.on_delivered(&batch),
            UploadStatus::Retryable => self.on_retryable(&batch, response),
            UploadStatus::Rejected => {
                let status = match response {
                    UploadResponse::Status(code) => code,
                    UploadResponse::Transport(_) => 0,
                };
                self.on_rejected(&batch, status)
            }
        }
    }

    fn on_delivered(&mut self, batch: &Batch) -> TickOutcome {
        if let Err(e) = self.reader.mark_delivered(batch) {
            tracing::error!("Delivered segment {} could not be deleted: {}", batch.segment, e);
        }
        metrics::counter!(telemetry::BATCHES_DELIVERED, 1, "category" => self.category.as_str());

        let more_pending = self
            .reader
            .queue()
            .closed_segments()
            .map(|segments| !segments.is_empty())
            .unwrap_or(false);
        if more_pending {
            self.delay.decrease();
        } else {
            self.delay.reset();
        }

        tracing::debug!(
            "Delivered {} batch {} ({} events), next tick in {:?}",
            self.category,
            batch.segment,
            batch.len(),
            self.delay.current()
        );
        self.state = WorkerState::Idle;
        TickOutcome::Delivered {
            segment: batch.segment,
            more_pending,
        }
    }

    fn on_retryable(&mut self, batch: &Batch, response: UploadResponse) -> TickOutcome {
        let attempts = self.reader.mark_failed(batch);
        metrics::counter!(telemetry::BATCHES_RETRIED, 1, "category" => self.category.as_str());

        if attempts >= self.retry.max_attempts {
            return self.drop_batch(batch, DropReason::MaxAttempts);
        }

        self.delay.increase();
        tracing::warn!(
            category = %self.category,
            segment = %batch.segment,
            attempts,
            "Upload failed with {}, retrying in {:?}",
            response,
            self.delay.current()
        );
        self.state = WorkerState::Backoff;
        TickOutcome::Retried {
            segment: batch.segment,
            attempts,
            response,
        }
    }

    fn on_rejected(&mut self, batch: &Batch, status: u16) -> TickOutcome {
        if let Err(e) = self.reader.mark_dropped(batch) {
            tracing::error!("Rejected segment {} could not be deleted: {}", batch.segment, e);
        }
        metrics::counter!(telemetry::BATCHES_REJECTED, 1, "category" => self.category.as_str());
        self.reader.queue().diagnostics().report(Diagnostic::UploadRejected {
            category: self.category,
            segment: batch.segment,
            status,
        });
        self.state = WorkerState::Idle;
        TickOutcome::Rejected {
            segment: batch.segment,
            status,
        }
    }

    fn drop_batch(&mut self, batch: &Batch, reason: DropReason) -> TickOutcome {
        let attempts = self.reader.attempts(batch.segment);
        if let Err(e) = self.reader.mark_dropped(batch) {
            tracing::error!("Dropped segment {} could not be deleted: {}", batch.segment, e);
        }
        metrics::counter!(telemetry::BATCHES_DROPPED, 1, "category" => self.category.as_str());
        self.reader.queue().diagnostics().report(Diagnostic::BatchDropped {
            category: self.category,
            segment: batch.segment,
            reason,
            attempts,
        });
        self.state = WorkerState::Idle;
        TickOutcome::Dropped {
            segment: batch.segment,
            reason,
        }
    }
}
