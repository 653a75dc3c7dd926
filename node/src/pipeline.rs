// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Pipeline runtime: one queue, writer and upload worker per category.
//!
//! Categories share nothing but the storage root. Each worker is its own
//! tokio task.

use crate::config::NodeConfig;
use crate::diagnostics::SharedSink;
use crate::errors::Result;
use crate::storage::batch::EventWriter;
use crate::storage::queue::PersistentQueue;
use crate::upload::client::Uploader;
use crate::upload::worker::UploadWorker;
use futures::future::join_all;
use pulse_kernel::{Event, EventCategory};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Lane {
    queue: Arc<PersistentQueue>,
    writer: EventWriter,
}

pub struct Pipeline {
    lanes: Vec<Lane>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Opens every category queue and spawns its worker. Must be called from
    /// within a tokio runtime.
    pub fn start<U>(config: &NodeConfig, uploader: U, diagnostics: SharedSink) -> Result<Self>
    where
        U: Uploader + Clone,
    {
        let cancel = CancellationToken::new();
        let mut lanes = Vec::with_capacity(EventCategory::ALL.len());
        let mut workers = Vec::with_capacity(EventCategory::ALL.len());

        for category in EventCategory::ALL {
            let queue = Arc::new(PersistentQueue::open(
                config.queue_dir(category),
                category,
                config.queue.clone(),
                diagnostics.clone(),
            )?);

            let worker = UploadWorker::new(
                queue.clone(),
                uploader.clone(),
                config.upload.delay.clone(),
                config.upload.retry.clone(),
            );
            workers.push(tokio::spawn(worker.run(cancel.child_token())));

            lanes.push(Lane {
                writer: EventWriter::new(queue.clone()),
                queue,
            });
        }

        tracing::info!("Pipeline started at {:?}", config.storage_root);
        Ok(Self { lanes, cancel, workers })
    }

    /// Routes the event to its category queue. Fire-and-forget.
    pub fn write(&self, event: &Event) {
        self.lane(event.category()).writer.write(event);
    }

    pub fn writer(&self, category: EventCategory) -> EventWriter {
        self.lane(category).writer.clone()
    }

    pub fn queue(&self, category: EventCategory) -> &Arc<PersistentQueue> {
        &self.lane(category).queue
    }

    /// Closes every open segment so its events become uploadable.
    pub fn flush(&self) {
        for lane in &self.lanes {
            if let Err(e) = lane.queue.flush() {
                tracing::warn!("Failed to flush {} queue: {}", lane.queue.category(), e);
            }
        }
    }

    /// Closed segments still waiting for upload, across all categories.
    pub fn pending_segments(&self) -> usize {
        self.lanes
            .iter()
            .map(|lane| lane.queue.closed_segments().map(|s| s.len()).unwrap_or(0))
            .sum()
    }

    /// Flushes, stops scheduling new uploads and waits for every worker.
    /// An upload already in flight completes first.
    pub async fn shutdown(self) {
        self.flush();
        self.cancel.cancel();
        for result in join_all(self.workers).await {
            if let Err(e) = result {
                tracing::error!("Upload worker task failed: {}", e);
            }
        }
        tracing::info!("Pipeline stopped");
    }

    fn lane(&self, category: EventCategory) -> &Lane {
        // Lanes are built in `EventCategory::ALL` order.
        let index = EventCategory::ALL
            .iter()
            .position(|c| *c == category)
            .unwrap_or_default();
        &self.lanes[index]
    }
}
