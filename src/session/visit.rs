// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Reconstructed session model. Read-only once built.

use crate::model::{RumActionEvent, RumErrorEvent, RumResourceEvent, RumViewEvent};
use crate::types::{SessionId, Timestamp, ViewId};

/// One visit of one view: every update of the view plus the actions,
/// resources and errors recorded while it was displayed.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewVisit {
    pub(crate) view_id: ViewId,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) started_at: Timestamp,
    pub(crate) view_events: Vec<RumViewEvent>,
    pub(crate) action_events: Vec<RumActionEvent>,
    pub(crate) resource_events: Vec<RumResourceEvent>,
    pub(crate) error_events: Vec<RumErrorEvent>,
}

impl ViewVisit {
    pub fn view_id(&self) -> &ViewId {
        &self.view_id
    }

    /// `view.name`, identical across all updates.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `view.url`, identical across all updates.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Timestamp of the earliest view update.
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// View updates ordered by document version.
    pub fn view_events(&self) -> &[RumViewEvent] {
        &self.view_events
    }

    pub fn action_events(&self) -> &[RumActionEvent] {
        &self.action_events
    }

    pub fn resource_events(&self) -> &[RumResourceEvent] {
        &self.resource_events
    }

    pub fn error_events(&self) -> &[RumErrorEvent] {
        &self.error_events
    }

    /// The last update decides whether the visit was closed.
    pub fn is_closed(&self) -> bool {
        self.view_events
            .last()
            .and_then(|e| e.view.is_active)
            .map(|active| !active)
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub(crate) session_id: SessionId,
    pub(crate) started_at: Timestamp,
    pub(crate) view_visits: Vec<ViewVisit>,
}

impl Session {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Timestamp of the earliest event of any kind in the session.
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Visits ordered by the timestamp of their first view update.
    pub fn view_visits(&self) -> &[ViewVisit] {
        &self.view_visits
    }

    pub fn visit(&self, view_id: &ViewId) -> Option<&ViewVisit> {
        self.view_visits.iter().find(|v| &v.view_id == view_id)
    }

    pub fn event_count(&self) -> usize {
        self.view_visits
            .iter()
            .map(|v| {
                v.view_events.len() + v.action_events.len() + v.resource_events.len() + v.error_events.len()
            })
            .sum()
    }
}
