// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Session reconstruction pass.
//!
//! # Protocol
//! ```text
//! flat events
//! ↓ group by session.id
//! ↓ stable sort by date
//! ↓ partition by type (view / action / resource / error)
//! ↓ per-type checks (plan, unique resource ids)
//! ↓ one visit per view.id, link every event by view.id
//! ↓ name/path constant per visit
//! ↓ sort updates by document version, check activity
//! ↓ order visits by first update
//! sessions
//! ```
//!
//! The first violation aborts the pass.

use crate::error::{ConsistencyError, ConsistencyResult};
use crate::model::{
    RumActionEvent, RumErrorEvent, RumEvent, RumRecord, RumResourceEvent, RumViewEvent,
};
use crate::session::validate::{check_activity, check_plan, check_unique_resources, required, ValidationOptions};
use crate::session::visit::{Session, ViewVisit};
use crate::types::{SessionId, ViewId};
use rustc_hash::FxHashMap;

/// Rebuilds sessions with the default options (plan 1).
pub fn reconstruct<'a, I>(events: I) -> ConsistencyResult<Vec<Session>>
where
    I: IntoIterator<Item = &'a RumEvent>,
{
    reconstruct_with(events, &ValidationOptions::default())
}

/// Rebuilds sessions, ordered by their earliest event (ties by session id).
pub fn reconstruct_with<'a, I>(events: I, options: &ValidationOptions) -> ConsistencyResult<Vec<Session>>
where
    I: IntoIterator<Item = &'a RumEvent>,
{
    let mut order: Vec<SessionId> = Vec::new();
    let mut grouped: FxHashMap<SessionId, Vec<&RumEvent>> = FxHashMap::default();

    for event in events {
        grouped
            .entry(event.session_id().clone())
            .or_insert_with(|| {
                order.push(event.session_id().clone());
                Vec::new()
            })
            .push(event);
    }

    let mut sessions = Vec::with_capacity(order.len());
    for session_id in order {
        let session_events = grouped.remove(&session_id).unwrap_or_default();
        sessions.push(build_session(session_id, session_events, options)?);
    }

    sessions.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    Ok(sessions)
}

struct VisitBuilder {
    visit: ViewVisit,
}

impl VisitBuilder {
    fn new(view_id: ViewId, started_at: u64) -> Self {
        Self {
            visit: ViewVisit {
                view_id,
                name: String::new(),
                path: String::new(),
                started_at,
                view_events: Vec::new(),
                action_events: Vec::new(),
                resource_events: Vec::new(),
                error_events: Vec::new(),
            },
        }
    }

    fn add_view_event(&mut self, event: &RumViewEvent) -> ConsistencyResult<()> {
        let name = required(event, event.view.name.as_deref(), "view.name")?;
        let path = required(event, event.view.url.as_deref(), "view.url")?;

        if self.visit.view_events.is_empty() {
            self.visit.name = name.to_string();
            self.visit.path = path.to_string();
        } else {
            self.ensure_same("name", &self.visit.name, name)?;
            self.ensure_same("path", &self.visit.path, path)?;
        }

        self.visit.view_events.push(event.clone());
        Ok(())
    }

    fn ensure_same(&self, field: &'static str, expected: &str, found: &str) -> ConsistencyResult<()> {
        if expected == found {
            return Ok(());
        }
        Err(ConsistencyError::InconsistentViewIdentity {
            view_id: self.visit.view_id.0.clone(),
            field,
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }

    fn finish(mut self) -> ConsistencyResult<ViewVisit> {
        for event in &self.visit.view_events {
            required(event, event.dd.document_version.as_ref(), "_dd.document_version")?;
        }
        // Stable: equal versions keep time order.
        self.visit
            .view_events
            .sort_by_key(|e| e.dd.document_version.unwrap_or_default());
        check_activity(&self.visit.view_events)?;
        Ok(self.visit)
    }
}

fn build_session(
    session_id: SessionId,
    mut events: Vec<&RumEvent>,
    options: &ValidationOptions,
) -> ConsistencyResult<Session> {
    events.sort_by_key(|e| e.date());
    let started_at = events.first().map(|e| e.date()).unwrap_or_default();

    let mut views: Vec<&RumViewEvent> = Vec::new();
    let mut actions: Vec<&RumActionEvent> = Vec::new();
    let mut resources: Vec<&RumResourceEvent> = Vec::new();
    let mut errors: Vec<&RumErrorEvent> = Vec::new();

    for event in events {
        match event {
            RumEvent::View(e) => views.push(e),
            RumEvent::Action(e) => actions.push(e),
            RumEvent::Resource(e) => resources.push(e),
            RumEvent::Error(e) => errors.push(e),
        }
    }

    check_plan(&views, options)?;
    check_plan(&actions, options)?;
    check_unique_resources(&resources)?;
    check_plan(&resources, options)?;
    check_plan(&errors, options)?;

    let mut visit_order: Vec<ViewId> = Vec::new();
    let mut visits: FxHashMap<ViewId, VisitBuilder> = FxHashMap::default();

    for view in views {
        visits
            .entry(view.view.id.clone())
            .or_insert_with(|| {
                visit_order.push(view.view.id.clone());
                VisitBuilder::new(view.view.id.clone(), view.date)
            })
            .add_view_event(view)?;
    }

    for action in actions {
        linked_visit(&mut visits, action)?.action_events.push(action.clone());
    }
    for resource in resources {
        linked_visit(&mut visits, resource)?.resource_events.push(resource.clone());
    }
    for error in errors {
        linked_visit(&mut visits, error)?.error_events.push(error.clone());
    }

    let mut view_visits = Vec::with_capacity(visit_order.len());
    for view_id in visit_order {
        if let Some(builder) = visits.remove(&view_id) {
            view_visits.push(builder.finish()?);
        }
    }
    view_visits.sort_by_key(|v| v.started_at);

    Ok(Session {
        session_id,
        started_at,
        view_visits,
    })
}

fn linked_visit<'v, R: RumRecord>(
    visits: &'v mut FxHashMap<ViewId, VisitBuilder>,
    event: &R,
) -> ConsistencyResult<&'v mut ViewVisit> {
    match visits.get_mut(event.view_id()) {
        Some(builder) => Ok(&mut builder.visit),
        None => Err(ConsistencyError::UnlinkedEvent {
            kind: R::KIND,
            session_id: event.session_id().0.clone(),
            view_id: event.view_id().0.clone(),
        }),
    }
}
