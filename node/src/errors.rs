// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::storage::queue::QueueError;
use crate::storage::segment::SegmentError;
use pulse_kernel::PayloadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Segment error: {0}")]
    Segment(#[from] SegmentError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;
