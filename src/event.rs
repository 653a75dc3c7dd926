// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Canonical event representation.
//!
//! Every record the SDK produces is an `Event`. Each event belongs to exactly
//! one `EventCategory`, and each category has its own queue directory, upload
//! worker and collector endpoint.
//!
//! # Invariants
//! - A stored record is one self-contained JSON object
//! - `Event::from_record(e.category(), &e.to_record()?)` yields `e`

use crate::error::{PayloadError, PayloadResult};
use crate::model::{LogEvent, RumEvent, SpanEvent};
use crate::payload::PayloadFormat;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Logs,
    Traces,
    Rum,
}

impl EventCategory {
    pub const ALL: [EventCategory; 3] = [EventCategory::Logs, EventCategory::Traces, EventCategory::Rum];

    /// Also the name of the category's queue directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Logs => "logs",
            EventCategory::Traces => "traces",
            EventCategory::Rum => "rum",
        }
    }

    /// Stable one-byte tag used in segment headers.
    pub fn tag(&self) -> u8 {
        match self {
            EventCategory::Logs => 1,
            EventCategory::Traces => 2,
            EventCategory::Rum => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(EventCategory::Logs),
            2 => Some(EventCategory::Traces),
            3 => Some(EventCategory::Rum),
            _ => None,
        }
    }

    /// Body format the collector expects for this category.
    pub fn payload_format(&self) -> PayloadFormat {
        match self {
            EventCategory::Traces => PayloadFormat::NdJson,
            EventCategory::Logs | EventCategory::Rum => PayloadFormat::JsonArray,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Log(LogEvent),
    Span(SpanEvent),
    Rum(RumEvent),
}

impl Event {
    pub fn category(&self) -> EventCategory {
        match self {
            Event::Log(_) => EventCategory::Logs,
            Event::Span(_) => EventCategory::Traces,
            Event::Rum(_) => EventCategory::Rum,
        }
    }

    /// Creation time: `date` for logs and RUM records, `start` for spans.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Event::Log(log) => log.date,
            Event::Span(span) => span.start,
            Event::Rum(rum) => rum.date(),
        }
    }

    /// Human-readable event type, for logs and diagnostics.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Log(_) => "log",
            Event::Span(_) => "span",
            Event::Rum(rum) => rum.kind().as_str(),
        }
    }

    /// Serializes the wrapped record as it is stored and shipped.
    pub fn to_record(&self) -> PayloadResult<Vec<u8>> {
        let bytes = match self {
            Event::Log(log) => serde_json::to_vec(log)?,
            Event::Span(span) => serde_json::to_vec(span)?,
            Event::Rum(rum) => serde_json::to_vec(rum)?,
        };
        Ok(bytes)
    }

    /// Decodes one stored record of the given category.
    pub fn from_record(category: EventCategory, record: &[u8]) -> PayloadResult<Self> {
        let event = match category {
            EventCategory::Logs => Event::Log(serde_json::from_slice(record)?),
            EventCategory::Traces => Event::Span(serde_json::from_slice(record)?),
            EventCategory::Rum => Event::Rum(serde_json::from_slice(record)?),
        };
        Ok(event)
    }

    /// Rejects events routed to a queue of another category.
    pub fn expect_category(&self, category: EventCategory) -> PayloadResult<()> {
        if self.category() == category {
            Ok(())
        } else {
            Err(PayloadError::CategoryMismatch {
                event: self.category(),
                category,
            })
        }
    }

    pub fn as_rum(&self) -> Option<&RumEvent> {
        match self {
            Event::Rum(rum) => Some(rum),
            _ => None,
        }
    }
}

impl From<LogEvent> for Event {
    fn from(log: LogEvent) -> Self {
        Event::Log(log)
    }
}

impl From<SpanEvent> for Event {
    fn from(span: SpanEvent) -> Self {
        Event::Span(span)
    }
}

impl From<RumEvent> for Event {
    fn from(rum: RumEvent) -> Self {
        Event::Rum(rum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogStatus;

    #[test]
    fn test_category_tags_roundtrip() {
        for category in EventCategory::ALL {
            assert_eq!(EventCategory::from_tag(category.tag()), Some(category));
        }
        assert_eq!(EventCategory::from_tag(0), None);
    }

    #[test]
    fn test_category_mismatch_is_reported() {
        let event = Event::Log(LogEvent::new(1, LogStatus::Info, "m", "s", "l"));
        assert!(event.expect_category(EventCategory::Logs).is_ok());
        assert!(matches!(
            event.expect_category(EventCategory::Rum),
            Err(PayloadError::CategoryMismatch { .. })
        ));
    }
}
