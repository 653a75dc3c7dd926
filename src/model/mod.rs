// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Typed telemetry records and their JSON wire shapes.

pub mod log;
pub mod rum;
pub mod span;

pub use log::{LogEvent, LogStatus};
pub use rum::{
    ActionInfo, DdInfo, DdSession, ErrorInfo, ResourceInfo, RumActionEvent, RumErrorEvent,
    RumEvent, RumEventKind, RumRecord, RumResourceEvent, RumViewEvent, SessionInfo, SessionPlan,
    ViewInfo,
};
pub use span::SpanEvent;
