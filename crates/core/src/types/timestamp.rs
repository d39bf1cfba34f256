//! Serde helpers for service timestamps.
//!
//! The service emits naive local timestamps in two shapes: ISO-8601 with a
//! `T` separator (`2026-03-01T09:30:00.123456`) for values it computes, and
//! SQLite's `CURRENT_TIMESTAMP` format (`2026-03-01 09:30:00`) for column
//! defaults. Both are accepted.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serializer};

const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a service timestamp.
#[must_use]
pub fn parse(value: &str) -> Option<NaiveDateTime> {
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value.trim(), format).ok())
}

/// `#[serde(with = "timestamp::option")]` for `Option<NaiveDateTime>` fields.
pub mod option {
    use super::{Deserialize, Deserializer, NaiveDateTime, Serializer, parse};

    /// Serialize as ISO-8601 with a `T` separator.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_some(&ts.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from either supported format; unparseable values are an
    /// error, `null` and missing values are `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if a present value matches neither format.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
        }
    }
}
