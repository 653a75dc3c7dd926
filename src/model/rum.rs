// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! RUM (real user monitoring) records.
//!
//! Every RUM record carries the same envelope: `date`, `session.id`,
//! `view.*` and the internal `_dd` block. The `type` field selects the
//! variant. Fields the session model depends on (`view.name`,
//! `view.is_active`, `_dd.document_version`, `_dd.session.plan`) are optional
//! at this level so a malformed record still decodes and the reconstruction
//! pass can report it instead of failing on the parse.

use crate::types::{SessionId, Timestamp, ViewId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RumEventKind {
    View,
    Action,
    Resource,
    Error,
}

impl RumEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RumEventKind::View => "view",
            RumEventKind::Action => "action",
            RumEventKind::Resource => "resource",
            RumEventKind::Error => "error",
        }
    }
}

impl fmt::Display for RumEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pricing tier a session was sampled into. Serialized as a bare integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionPlan(pub u8);

impl SessionPlan {
    pub const LITE: SessionPlan = SessionPlan(1);
    pub const PREMIUM: SessionPlan = SessionPlan(2);
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewInfo {
    pub id: ViewId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<SessionPlan>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<DdSession>,
}

impl DdInfo {
    pub fn with_plan(plan: SessionPlan) -> Self {
        Self {
            document_version: None,
            session: Some(DdSession { plan: Some(plan) }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RumViewEvent {
    pub date: Timestamp,
    pub session: SessionInfo,
    pub view: ViewInfo,
    #[serde(rename = "_dd")]
    pub dd: DdInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInfo {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RumActionEvent {
    pub date: Timestamp,
    pub session: SessionInfo,
    pub view: ViewInfo,
    #[serde(rename = "_dd")]
    pub dd: DdInfo,
    pub action: ActionInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RumResourceEvent {
    pub date: Timestamp,
    pub session: SessionInfo,
    pub view: ViewInfo,
    #[serde(rename = "_dd")]
    pub dd: DdInfo,
    pub resource: ResourceInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RumErrorEvent {
    pub date: Timestamp,
    pub session: SessionInfo,
    pub view: ViewInfo,
    #[serde(rename = "_dd")]
    pub dd: DdInfo,
    pub error: ErrorInfo,
}

/// Shared envelope access for the four RUM record types.
pub trait RumRecord {
    const KIND: RumEventKind;

    fn date(&self) -> Timestamp;
    fn session_id(&self) -> &SessionId;
    fn view(&self) -> &ViewInfo;
    fn dd(&self) -> &DdInfo;

    fn view_id(&self) -> &ViewId {
        &self.view().id
    }

    fn plan(&self) -> Option<SessionPlan> {
        self.dd().session.as_ref().and_then(|s| s.plan)
    }
}

macro_rules! rum_record {
    ($ty:ty, $kind:expr) => {
        impl RumRecord for $ty {
            const KIND: RumEventKind = $kind;

            fn date(&self) -> Timestamp {
                self.date
            }

            fn session_id(&self) -> &SessionId {
                &self.session.id
            }

            fn view(&self) -> &ViewInfo {
                &self.view
            }

            fn dd(&self) -> &DdInfo {
                &self.dd
            }
        }
    };
}

rum_record!(RumViewEvent, RumEventKind::View);
rum_record!(RumActionEvent, RumEventKind::Action);
rum_record!(RumResourceEvent, RumEventKind::Resource);
rum_record!(RumErrorEvent, RumEventKind::Error);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RumEvent {
    View(RumViewEvent),
    Action(RumActionEvent),
    Resource(RumResourceEvent),
    Error(RumErrorEvent),
}

impl RumEvent {
    pub fn kind(&self) -> RumEventKind {
        match self {
            RumEvent::View(_) => RumEventKind::View,
            RumEvent::Action(_) => RumEventKind::Action,
            RumEvent::Resource(_) => RumEventKind::Resource,
            RumEvent::Error(_) => RumEventKind::Error,
        }
    }

    pub fn date(&self) -> Timestamp {
        match self {
            RumEvent::View(e) => e.date,
            RumEvent::Action(e) => e.date,
            RumEvent::Resource(e) => e.date,
            RumEvent::Error(e) => e.date,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            RumEvent::View(e) => e.session_id(),
            RumEvent::Action(e) => e.session_id(),
            RumEvent::Resource(e) => e.session_id(),
            RumEvent::Error(e) => e.session_id(),
        }
    }

    pub fn view_id(&self) -> &ViewId {
        match self {
            RumEvent::View(e) => e.view_id(),
            RumEvent::Action(e) => e.view_id(),
            RumEvent::Resource(e) => e.view_id(),
            RumEvent::Error(e) => e.view_id(),
        }
    }
}
