// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Delivery of closed segments to the collector.

pub mod client;
pub mod delay;
pub mod status;
pub mod worker;

pub use client::{HttpUploader, UploadRequest, Uploader};
pub use delay::UploadDelay;
pub use status::{UploadResponse, UploadStatus};
pub use worker::{TickOutcome, UploadWorker, WorkerState};
