// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! RUM session reconstruction and consistency checks.
//!
//! Takes the flat list of RUM records a collector received and rebuilds
//! sessions made of view visits. Any structural violation is reported as a
//! `ConsistencyError` naming the offending event.

pub mod reconstruct;
pub mod validate;
pub mod visit;

pub use reconstruct::{reconstruct, reconstruct_with};
pub use validate::ValidationOptions;
pub use visit::{Session, ViewVisit};

use crate::error::ConsistencyResult;
use crate::event::Event;

/// Reconstructs sessions from a mixed event stream, ignoring logs and spans.
pub fn reconstruct_events(events: &[Event], options: &ValidationOptions) -> ConsistencyResult<Vec<Session>> {
    reconstruct_with(events.iter().filter_map(Event::as_rum), options)
}
