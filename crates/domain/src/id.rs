//! Typed identifier newtypes.
//!
//! Sensor and device identifiers are short human-chosen names coming from
//! configuration (`dht11`, `living_room_light`). Record identifiers are a
//! monotonic per-process counter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! define_name_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Wrap a name, rejecting empty or blank strings.
            ///
            /// # Errors
            ///
            /// Returns [`ValidationError::EmptyId`] when `name` is blank.
            pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
                let name = name.into();
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::EmptyId);
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Borrow the inner name.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_name_id!(
    /// Identifier of a configured sensor (e.g. `dht11`, `pir`).
    SensorId
);

define_name_id!(
    /// Identifier of a controllable or feedback device (e.g. `led_red`).
    DeviceId
);

/// Monotonic identifier of a [`PublishRecord`](crate::record::PublishRecord).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(u64);

impl RecordId {
    /// Wrap a raw counter value.
    #[must_use]
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Access the raw counter value.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
