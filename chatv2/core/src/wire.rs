//! Decoding helpers for backend payloads
//!
//! The chat service serializes dates in more than one shape depending on how
//! its JSON mapper is configured: epoch milliseconds, RFC 3339 strings, or
//! `yyyy-MM-dd HH:mm:ss` wall-clock strings. [`timestamp`] accepts all three
//! and always serializes back out as RFC 3339.
//!
//! Boxed Java fields also arrive as explicit `null`; [`null_as_default`]
//! folds those into the Rust default.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const WALL_CLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

/// Parse a textual timestamp in any of the accepted formats
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, WALL_CLOCK_FORMAT) {
        return Some(Utc.from_utc_datetime(&naive));
    }
    text.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Deserialize a value that may be `null`, falling back to `T::default()`
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serde adapter for `Option<DateTime<Utc>>` fields
pub mod timestamp {
    use super::{parse_timestamp, DateTime, Deserialize, Deserializer, RawTimestamp, Serializer, TimeZone, Utc};

    /// Deserialize an optional timestamp, treating unparseable values as absent
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
        Ok(match raw {
            Some(RawTimestamp::Millis(ms)) => Utc.timestamp_millis_opt(ms).single(),
            Some(RawTimestamp::Text(text)) => parse_timestamp(&text),
            None => None,
        })
    }

    /// Serialize as RFC 3339 (or `null`)
    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }
}
