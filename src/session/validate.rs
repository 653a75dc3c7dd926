// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Per-type structural checks run before events are linked into visits.

use crate::error::{ConsistencyError, ConsistencyResult};
use crate::model::{RumRecord, RumResourceEvent, RumViewEvent, SessionPlan};
use rustc_hash::FxHashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Every RUM event must report this plan in `_dd.session.plan`.
    pub expected_plan: SessionPlan,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            expected_plan: SessionPlan::LITE,
        }
    }
}

pub(crate) fn check_plan<R: RumRecord>(events: &[&R], options: &ValidationOptions) -> ConsistencyResult<()> {
    for event in events {
        let found = event.plan();
        if found != Some(options.expected_plan) {
            return Err(ConsistencyError::BadSessionPlan {
                kind: R::KIND,
                session_id: event.session_id().0.clone(),
                view_id: event.view_id().0.clone(),
                found: found.map(|p| p.0),
                expected: options.expected_plan.0,
            });
        }
    }
    Ok(())
}

pub(crate) fn check_unique_resources(events: &[&RumResourceEvent]) -> ConsistencyResult<()> {
    let mut seen = FxHashSet::default();
    for event in events {
        if !seen.insert(event.resource.id.as_str()) {
            return Err(ConsistencyError::DuplicateResourceId {
                session_id: event.session.id.0.clone(),
                resource_id: event.resource.id.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn required<'a, R: RumRecord, T>(
    event: &'a R,
    value: Option<&'a T>,
    field: &'static str,
) -> ConsistencyResult<&'a T>
where
    T: ?Sized,
{
    value.ok_or_else(|| ConsistencyError::MissingField {
        kind: R::KIND,
        session_id: event.session_id().0.clone(),
        view_id: event.view_id().0.clone(),
        field,
    })
}

/// Walks view updates in document-version order. The first must be active;
/// afterwards `is_active` may drop to false once and never come back.
pub(crate) fn check_activity(view_events: &[RumViewEvent]) -> ConsistencyResult<()> {
    let mut was_active = false;
    for (index, event) in view_events.iter().enumerate() {
        let is_active = *required(event, event.view.is_active.as_ref(), "view.is_active")?;
        let document_version = event.dd.document_version.unwrap_or_default();

        if index == 0 {
            if !is_active {
                return Err(ConsistencyError::InactiveFirstUpdate {
                    view_id: event.view.id.0.clone(),
                    document_version,
                });
            }
        } else if !was_active && is_active {
            return Err(ConsistencyError::ViewReactivated {
                view_id: event.view.id.0.clone(),
                document_version,
            });
        }
        was_active = is_active;
    }
    Ok(())
}
