// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Delivery outcome classification.

use std::fmt;

/// What the collector (or the network) said about one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResponse {
    Status(u16),
    /// Timeout, refused connection, DNS failure and the like.
    Transport(String),
}

impl fmt::Display for UploadResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadResponse::Status(code) => write!(f, "HTTP {}", code),
            UploadResponse::Transport(reason) => write!(f, "transport error: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    /// 2xx. The segment is deleted.
    Delivered,
    /// 429, 5xx or transport error. The segment is kept.
    Retryable,
    /// Any other status. The segment is deleted without retry.
    Rejected,
}

impl UploadStatus {
    pub fn classify(response: &UploadResponse) -> Self {
        match response {
            UploadResponse::Transport(_) => UploadStatus::Retryable,
            UploadResponse::Status(code) => match *code {
                200..=299 => UploadStatus::Delivered,
                429 | 500..=599 => UploadStatus::Retryable,
                _ => UploadStatus::Rejected,
            },
        }
    }
}
