// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! On-disk event buffering: one directory of segment files per category.

pub mod batch;
pub mod queue;
pub mod segment;

pub use batch::{Batch, BatchReader, EventWriter};
pub use queue::{PersistentQueue, QueueError};
pub use segment::{SegmentData, SegmentError, SegmentId, SegmentState};
