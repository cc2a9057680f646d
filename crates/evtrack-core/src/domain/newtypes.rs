//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Event identity
// ============================================================================

/// Globally unique identity of an event, shared by every copy of it
///
/// Freshly tracked events get a random UUID v4. Identifiers received from
/// the server are accepted as opaque strings; only emptiness and
/// surrounding whitespace are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    /// Mint a new random EventId
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an EventId from an existing identifier string
    ///
    /// # Errors
    /// Returns error if the identifier is empty or padded with whitespace
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidId("Event uuid cannot be empty".to_string()));
        }
        if id.trim() != id {
            return Err(DomainError::InvalidId(format!(
                "Event uuid has surrounding whitespace: '{id}'"
            )));
        }
        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for EventId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Local-storage-only surrogate key of an event (database row ID)
///
/// Never transmitted and never used for identity across devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(i64);

impl RowId {
    /// Create a RowId from an i64 value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for RowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RowId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid RowId: {e}")))
    }
}

impl From<i64> for RowId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// UpdatedAt - structured conflict-resolution timestamp
// ============================================================================

/// Offset-aware formats tried after RFC 3339
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S %z",
];

/// Offset-less formats, interpreted as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S UTC",
];

/// Last-modification instant of an event, the sole conflict-resolution signal
///
/// Timestamps are normalized to UTC on construction so that ordering is
/// defined over instants rather than over the textual representation the
/// server happened to use. Accepted inputs:
///
/// - RFC 3339 with any offset (`2020-01-01T10:00:00+02:00`, `...Z`)
/// - ISO 8601 without offset (`2020-01-01T10:00`, `2020-01-01 10:00:00.5`),
///   interpreted as UTC
/// - epoch milliseconds as a decimal string
///
/// The canonical text form is RFC 3339 in UTC with millisecond precision.
/// Instants carrying finer precision keep all of it, so the text form
/// always parses back to the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UpdatedAt(DateTime<Utc>);

impl UpdatedAt {
    /// The current instant, truncated to millisecond precision
    #[must_use]
    pub fn now() -> Self {
        Self::from_millis(Utc::now().timestamp_millis()).unwrap_or(Self(Utc::now()))
    }

    /// Wrap an existing UTC instant
    #[must_use]
    pub const fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Build from epoch milliseconds
    pub fn from_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    /// Parse a server- or client-supplied timestamp string
    ///
    /// # Errors
    /// Returns error if the string matches none of the accepted formats
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DomainError::InvalidTimestamp(
                "Timestamp cannot be empty".to_string(),
            ));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }

        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Ok(Self(dt.with_timezone(&Utc)));
            }
        }

        for fmt in NAIVE_FORMATS {
            if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Self(ndt.and_utc()));
            }
        }

        if s.bytes().all(|b| b.is_ascii_digit()) {
            if let Some(ts) = s.parse::<i64>().ok().and_then(Self::from_millis) {
                return Ok(ts);
            }
        }

        Err(DomainError::InvalidTimestamp(format!(
            "Unrecognized timestamp format: '{s}'"
        )))
    }

    /// Get the inner UTC instant
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Epoch milliseconds of this instant
    #[must_use]
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl Display for UpdatedAt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let format = if self.0.timestamp_subsec_nanos() % 1_000_000 == 0 {
            SecondsFormat::Millis
        } else {
            SecondsFormat::AutoSi
        };
        write!(f, "{}", self.0.to_rfc3339_opts(format, true))
    }
}

impl FromStr for UpdatedAt {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UpdatedAt {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<UpdatedAt> for String {
    fn from(ts: UpdatedAt) -> Self {
        ts.to_string()
    }
}

impl From<DateTime<Utc>> for UpdatedAt {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

// ============================================================================
// Watermark
// ============================================================================

/// Poll watermark (opaque string supplied by the server)
///
/// Marks the last successfully merged poll response. The watermark is
/// opaque - we don't validate its contents, only that it's non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Watermark(String);

impl Watermark {
    /// Create a new Watermark
    ///
    /// # Errors
    /// Returns error if the watermark is empty
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.is_empty() {
            return Err(DomainError::InvalidWatermark(
                "Watermark cannot be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Watermark {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Watermark {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for Watermark {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Watermark> for String {
    fn from(watermark: Watermark) -> Self {
        watermark.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod event_id_tests {
        use super::*;

        #[test]
        fn test_generate_creates_unique_ids() {
            let id1 = EventId::generate();
            let id2 = EventId::generate();
            assert_ne!(id1, id2);
            assert!(Uuid::parse_str(id1.as_str()).is_ok());
        }

        #[test]
        fn test_opaque_server_ids_accepted() {
            let id = EventId::from_str("A").unwrap();
            assert_eq!(id.as_str(), "A");
        }

        #[test]
        fn test_empty_fails() {
            assert!(EventId::new(String::new()).is_err());
        }

        #[test]
        fn test_whitespace_fails() {
            assert!(EventId::new(" abc".to_string()).is_err());
        }

        #[test]
        fn test_serde_rejects_empty() {
            let result: Result<EventId, _> = serde_json::from_str("\"\"");
            assert!(result.is_err());
        }
    }

    mod row_id_tests {
        use super::*;

        #[test]
        fn test_display_and_parse() {
            let id = RowId::new(42);
            assert_eq!(id.to_string(), "42");
            assert_eq!(RowId::from_str("42").unwrap(), id);
            assert!(RowId::from_str("forty-two").is_err());
        }
    }

    mod updated_at_tests {
        use super::*;

        #[test]
        fn test_parse_minute_precision_as_utc() {
            let ts = UpdatedAt::parse("2020-01-01T10:00").unwrap();
            assert_eq!(ts.to_string(), "2020-01-01T10:00:00.000Z");
        }

        #[test]
        fn test_parse_normalizes_offsets() {
            let a = UpdatedAt::parse("2020-01-01T12:00:00+02:00").unwrap();
            let b = UpdatedAt::parse("2020-01-01T10:00:00Z").unwrap();
            assert_eq!(a, b);
        }

        #[test]
        fn test_ordering_is_by_instant_not_text() {
            // Lexicographically "09:30+00:00" > "10:00+05:00", but the latter is earlier
            let later = UpdatedAt::parse("2020-01-01T09:30:00+00:00").unwrap();
            let earlier = UpdatedAt::parse("2020-01-01T10:00:00+05:00").unwrap();
            assert!(later > earlier);
        }

        #[test]
        fn test_parse_space_separated() {
            let ts = UpdatedAt::parse("2020-01-01 10:00:00").unwrap();
            assert_eq!(ts, UpdatedAt::parse("2020-01-01T10:00").unwrap());
        }

        #[test]
        fn test_parse_fractional_seconds() {
            let ts = UpdatedAt::parse("2020-01-01T10:00:00.250Z").unwrap();
            assert_eq!(ts.timestamp_millis() % 1000, 250);
        }

        #[test]
        fn test_parse_epoch_millis() {
            let ts = UpdatedAt::parse("1577872800000").unwrap();
            assert_eq!(ts, UpdatedAt::parse("2020-01-01T10:00:00Z").unwrap());
        }

        #[test]
        fn test_parse_garbage_fails() {
            assert!(UpdatedAt::parse("yesterday").is_err());
            assert!(UpdatedAt::parse("").is_err());
        }

        #[test]
        fn test_serde_roundtrip_canonical() {
            let ts = UpdatedAt::parse("2020-01-01T10:00").unwrap();
            let json = serde_json::to_string(&ts).unwrap();
            assert_eq!(json, "\"2020-01-01T10:00:00.000Z\"");
            let parsed: UpdatedAt = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, ts);
        }

        #[test]
        fn test_sub_millisecond_precision_survives_text_form() {
            let newer = UpdatedAt::parse("2020-01-01T10:00:00.123900Z").unwrap();
            let older = UpdatedAt::parse("2020-01-01T10:00:00.123500Z").unwrap();
            assert_eq!(newer.to_string(), "2020-01-01T10:00:00.123900Z");

            let reparsed = UpdatedAt::parse(&newer.to_string()).unwrap();
            assert_eq!(reparsed, newer);
            assert!(reparsed > older);
        }

        #[test]
        fn test_now_has_millisecond_precision() {
            let ts = UpdatedAt::now();
            let reparsed = UpdatedAt::parse(&ts.to_string()).unwrap();
            assert_eq!(ts, reparsed);
        }
    }

    mod watermark_tests {
        use super::*;

        #[test]
        fn test_new_valid() {
            let wm = Watermark::new("T1".to_string()).unwrap();
            assert_eq!(wm.as_str(), "T1");
        }

        #[test]
        fn test_empty_fails() {
            let result = Watermark::new(String::new());
            assert!(matches!(result, Err(DomainError::InvalidWatermark(_))));
        }
    }
}
