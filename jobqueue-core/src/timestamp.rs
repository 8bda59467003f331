//! Timestamp normalisation
//!
//! Job timestamps are accepted in a few textual forms and always stored as
//! UTC, serialised as RFC 3339 with an explicit `+00:00` offset.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::{Result, ValidationError};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a timestamp into UTC
///
/// Accepts RFC 3339 with any offset, ISO 8601 with a `+hhmm` offset, and
/// offset-less `YYYY-MM-DD HH:MM:SS` (taken as UTC).
pub fn parse(value: &str) -> Result<DateTime<Utc>> {
    parse_at("timestamp", value)
}

/// Parse a timestamp, reporting a bad value at `path`
pub fn parse_at(path: &str, value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ValidationError::invalid_value(path, format!("\"{value}\" is not a valid date")))
}

/// Canonical string form
pub fn format(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// serde adapter for `Option<DateTime<Utc>>` fields
pub mod optional {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&format(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(value) if value.is_empty() => Ok(None),
            Some(value) => parse(&value).map(Some).map_err(serde::de::Error::custom),
        }
    }
}
