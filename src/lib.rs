// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! pulse-kernel: telemetry record model, collector payload codecs and the
//! RUM session consistency checker shared by the node and the verifier.

pub mod correlation;
pub mod error;
pub mod event;
pub mod model;
pub mod payload;
pub mod session;
pub mod types;

pub use error::{ConsistencyError, CorrelationError, PayloadError};
pub use event::{Event, EventCategory};
pub use payload::PayloadFormat;

#[cfg(test)]
pub mod tests;
