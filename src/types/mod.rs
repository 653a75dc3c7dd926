// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod id;

/// Wall-clock nanoseconds since the Unix epoch.
pub type Timestamp = u64;

pub use id::{SessionId, SpanId, TraceId, ViewId};
