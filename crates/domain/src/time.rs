//! Time and timestamp helpers.
//!
//! Every timestamp in the system is UTC with second precision. Log
//! partitions are cut at UTC midnight, so the partition date of a record is
//! simply the UTC date of its timestamp.

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};

/// UTC timestamp used for readings, events, commands and records.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time truncated to whole seconds.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(0)
}

/// Format a timestamp as ISO-8601 with second precision (`2025-11-04T16:22:15Z`).
#[must_use]
pub fn format_iso(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The log partition date a timestamp belongs to.
#[must_use]
pub fn partition_date(ts: &Timestamp) -> NaiveDate {
    ts.date_naive()
}

/// Serde adapter writing timestamps with [`format_iso`].
pub mod iso_seconds {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Timestamp;

    /// Serialize with second precision.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_iso(ts))
    }

    /// Deserialize any RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Fails when the string is not RFC 3339.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        chrono::DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.to_utc())
            .map_err(serde::de::Error::custom)
    }
}
