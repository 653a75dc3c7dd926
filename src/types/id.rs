// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Identity types.
//!
//! Tracing ids travel in two encodings: spans carry them as lowercase hex,
//! logs linked to a span carry them as decimal strings.

use crate::error::CorrelationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct TraceId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct SpanId(pub u64);

macro_rules! tracing_id {
    ($ty:ident) => {
        impl $ty {
            pub fn to_hex(&self) -> String {
                format!("{:x}", self.0)
            }

            pub fn to_decimal(&self) -> String {
                self.0.to_string()
            }

            pub fn from_hex(value: &str) -> Result<Self, CorrelationError> {
                u64::from_str_radix(value, 16)
                    .map($ty)
                    .map_err(|_| CorrelationError::MalformedId(value.to_string()))
            }

            pub fn from_decimal(value: &str) -> Result<Self, CorrelationError> {
                value
                    .parse::<u64>()
                    .map($ty)
                    .map_err(|_| CorrelationError::MalformedId(value.to_string()))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:x}", self.0)
            }
        }

        // Hex on the wire.
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                $ty::from_hex(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

tracing_id!(TraceId);
tracing_id!(SpanId);

/// RUM session identifier (UUID string as produced by the SDK).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

/// RUM view identifier. One value per view visit.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

impl From<&str> for ViewId {
    fn from(value: &str) -> Self {
        ViewId(value.to_string())
    }
}
