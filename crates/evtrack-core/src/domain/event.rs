//! EventRecord - the synchronizable unit
//!
//! An [`EventRecord`] represents one tracked activity. Its identity is the
//! [`EventId`] minted at creation, shared by every copy of the event on
//! every device; the [`RowId`] is a local surrogate only.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──► commit (persisted) ──► edits (touch) ──► mark_deleted (tombstone)
//!                 ▲
//! placeholder() ──┘ (reconciler, when a remote snapshot wins)
//! ```
//!
//! Records are never physically erased. Deletion flips the tombstone flag
//! so that a later, older update for the same uuid cannot resurrect it.

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize};

use super::errors::DomainError;
use super::newtypes::{EventId, RowId, UpdatedAt};

/// A single GPS fix captured while an event was being tracked
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinate {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Capture time (epoch milliseconds)
    pub timestamp: i64,
}

impl GpsCoordinate {
    /// Creates a new GPS fix
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }
}

// ============================================================================
// EventRecord
// ============================================================================

/// One tracked activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    row_id: Option<RowId>,
    uuid: EventId,
    name: String,
    notes: String,
    /// Epoch milliseconds
    start_time: i64,
    /// Epoch milliseconds, `0` while the event is in progress
    end_time: i64,
    updated_at: Option<UpdatedAt>,
    deleted: bool,
    persisted: bool,
    #[serde(default)]
    gps: Vec<GpsCoordinate>,
}

impl EventRecord {
    /// Starts tracking a new event
    ///
    /// Mints a fresh uuid and stamps `updated_at` with the current time.
    /// The record is not persisted until it is committed to the local store.
    pub fn new(name: impl Into<String>, notes: impl Into<String>, start_time: i64) -> Self {
        Self {
            row_id: None,
            uuid: EventId::generate(),
            name: name.into(),
            notes: notes.into(),
            start_time,
            end_time: 0,
            updated_at: Some(UpdatedAt::now()),
            deleted: false,
            persisted: false,
            gps: Vec::new(),
        }
    }

    /// Identity-only record for a uuid the local store has never seen
    ///
    /// Content is empty and `updated_at` is unset, so any remote snapshot
    /// is at least as new as the placeholder.
    pub fn placeholder(uuid: EventId) -> Self {
        Self {
            row_id: None,
            uuid,
            name: String::new(),
            notes: String::new(),
            start_time: 0,
            end_time: 0,
            updated_at: None,
            deleted: false,
            persisted: false,
            gps: Vec::new(),
        }
    }

    /// Rebuilds a stored record from its columns
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        row_id: RowId,
        uuid: EventId,
        name: String,
        notes: String,
        start_time: i64,
        end_time: i64,
        updated_at: Option<UpdatedAt>,
        deleted: bool,
        persisted: bool,
        gps: Vec<GpsCoordinate>,
    ) -> Self {
        Self {
            row_id: Some(row_id),
            uuid,
            name,
            notes,
            start_time,
            end_time,
            updated_at,
            deleted,
            persisted,
            gps,
        }
    }

    // --- builder-style setters (used by storage adapters and tests) ---

    /// Sets the local row id
    pub fn with_row_id(mut self, row_id: RowId) -> Self {
        self.row_id = Some(row_id);
        self
    }

    /// Replaces the identity
    pub fn with_uuid(mut self, uuid: EventId) -> Self {
        self.uuid = uuid;
        self
    }

    /// Sets the end time without touching `updated_at`
    pub fn with_end_time(mut self, end_time: i64) -> Self {
        self.end_time = end_time;
        self
    }

    /// Sets `updated_at` explicitly
    pub fn with_updated_at(mut self, updated_at: Option<UpdatedAt>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Sets the tombstone flag without touching `updated_at`
    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Sets the persisted flag
    pub fn with_persisted(mut self, persisted: bool) -> Self {
        self.persisted = persisted;
        self
    }

    /// Replaces the GPS trace
    pub fn with_gps(mut self, gps: Vec<GpsCoordinate>) -> Self {
        self.gps = gps;
        self
    }

    // --- getters ---

    /// Local row id, if the record has been stored
    pub fn row_id(&self) -> Option<RowId> {
        self.row_id
    }

    /// Global identity
    pub fn uuid(&self) -> &EventId {
        &self.uuid
    }

    /// Event name (may be blank)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-text notes
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Start time (epoch milliseconds)
    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    /// End time (epoch milliseconds), `0` while in progress
    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    /// Last-modification instant, `None` for placeholders
    pub fn updated_at(&self) -> Option<&UpdatedAt> {
        self.updated_at.as_ref()
    }

    /// Whether the record is a tombstone
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Whether the record has ever been committed to the local store
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Recorded GPS trace, oldest first
    pub fn gps(&self) -> &[GpsCoordinate] {
        &self.gps
    }

    // --- queries ---

    /// An event with `end_time == 0` is still being tracked
    pub fn is_in_progress(&self) -> bool {
        self.end_time == 0
    }

    /// Whether the event carries a non-blank name
    pub fn is_named(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// `end_time != 0 ⇒ end_time >= start_time`
    pub fn has_valid_interval(&self) -> bool {
        self.end_time == 0 || self.end_time >= self.start_time
    }

    /// Duration of a finished event
    ///
    /// `None` while in progress or when the interval does not fit a duration.
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms().and_then(Duration::try_milliseconds)
    }

    /// Duration in milliseconds, `None` while in progress or on overflow
    pub fn duration_ms(&self) -> Option<i64> {
        if self.is_in_progress() {
            None
        } else {
            self.end_time.checked_sub(self.start_time)
        }
    }

    /// Whether this copy is strictly newer than `other`
    ///
    /// A record without `updated_at` is never newer than anything.
    pub fn is_newer_than(&self, other: &UpdatedAt) -> bool {
        matches!(self.updated_at, Some(ref local) if local > other)
    }

    // --- mutations ---

    /// Records the assigned row id after a store write
    pub fn set_row_id(&mut self, row_id: RowId) {
        self.row_id = Some(row_id);
    }

    /// Marks the record as durably committed
    pub fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// Stamps a new local modification time
    ///
    /// The new stamp is strictly greater than the previous one even if the
    /// wall clock went backwards, so a local edit always supersedes the
    /// version it was made on.
    pub fn touch(&mut self) {
        let now = UpdatedAt::now();
        self.updated_at = Some(match self.updated_at {
            Some(prev) if prev >= now => {
                UpdatedAt::from_millis(prev.timestamp_millis() + 1).unwrap_or(prev)
            }
            _ => now,
        });
    }

    /// Applies a user edit, returning whether anything changed
    ///
    /// `updated_at` is only touched when the edit actually changes content.
    pub fn apply_edit(&mut self, edit: &EventEdit) -> bool {
        let mut changed = false;

        if let Some(ref name) = edit.name {
            if *name != self.name {
                self.name = name.clone();
                changed = true;
            }
        }
        if let Some(ref notes) = edit.notes {
            if *notes != self.notes {
                self.notes = notes.clone();
                changed = true;
            }
        }
        if let Some(start) = edit.start_time {
            if start != self.start_time {
                self.start_time = start;
                changed = true;
            }
        }
        if let Some(end) = edit.end_time {
            if end != self.end_time {
                self.end_time = end;
                changed = true;
            }
        }

        if changed {
            self.touch();
        }
        changed
    }

    /// Stops tracking the event at `end_time`
    ///
    /// # Errors
    /// Returns error if `end_time` is zero or earlier than the start time
    pub fn finish(&mut self, end_time: i64) -> Result<(), DomainError> {
        if end_time == 0 {
            return Err(DomainError::ValidationFailed(
                "End time 0 is reserved for events in progress".to_string(),
            ));
        }
        if end_time < self.start_time {
            return Err(DomainError::ValidationFailed(format!(
                "Event cannot end ({end_time}) before it starts ({})",
                self.start_time
            )));
        }
        self.end_time = end_time;
        self.touch();
        Ok(())
    }

    /// Turns the record into a tombstone
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.touch();
    }

    /// Appends a GPS fix to the trace
    pub fn add_gps(&mut self, coordinate: GpsCoordinate) {
        self.gps.push(coordinate);
    }

    /// Overwrites content, tombstone and `updated_at` with a remote snapshot
    ///
    /// Identity, row id and GPS trace are left as they are. The record is
    /// marked persisted because the caller commits it right after.
    pub fn apply_snapshot(&mut self, snapshot: &RemoteSnapshot) {
        self.name = snapshot.name.clone();
        self.notes = snapshot.notes.clone();
        self.start_time = snapshot.start_time;
        self.end_time = snapshot.end_time;
        self.deleted = snapshot.deleted;
        self.updated_at = Some(snapshot.updated_at);
        self.persisted = true;
    }
}

/// A user edit; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventEdit {
    /// New name
    pub name: Option<String>,
    /// New notes
    pub notes: Option<String>,
    /// New start time (epoch milliseconds)
    pub start_time: Option<i64>,
    /// New end time (epoch milliseconds)
    pub end_time: Option<i64>,
}

impl EventEdit {
    /// Returns true if the edit carries no field
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.notes.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
    }
}

// ============================================================================
// RemoteSnapshot - one element of a poll response
// ============================================================================

/// Server copy of an event as found in a poll response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteSnapshot {
    /// Global identity
    pub uuid: EventId,
    /// Server-side modification instant
    pub updated_at: UpdatedAt,
    /// Event name, an explicit `null` reads as blank
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
    /// Free-text notes, an explicit `null` reads as blank
    #[serde(deserialize_with = "null_as_empty")]
    pub notes: String,
    /// Start time (epoch milliseconds)
    #[serde(rename = "startTime")]
    pub start_time: i64,
    /// End time (epoch milliseconds)
    #[serde(rename = "endTime")]
    pub end_time: i64,
    /// Tombstone flag
    pub deleted: bool,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> UpdatedAt {
        UpdatedAt::parse(s).unwrap()
    }

    #[test]
    fn test_new_event_is_open_and_unpersisted() {
        let event = EventRecord::new("Lunch", "", 1_000);
        assert!(event.is_in_progress());
        assert!(!event.is_persisted());
        assert!(!event.is_deleted());
        assert!(event.updated_at().is_some());
        assert!(event.row_id().is_none());
    }

    #[test]
    fn test_placeholder_is_never_newer() {
        let placeholder = EventRecord::placeholder(EventId::new("A".to_string()).unwrap());
        assert!(!placeholder.is_newer_than(&ts("1970-01-01T00:00")));
    }

    #[test]
    fn test_is_newer_than() {
        let event = EventRecord::new("Lunch", "", 0).with_updated_at(Some(ts("2020-01-01T10:00")));
        assert!(event.is_newer_than(&ts("2020-01-01T09:00")));
        assert!(!event.is_newer_than(&ts("2020-01-01T10:00")));
        assert!(!event.is_newer_than(&ts("2020-01-01T11:00")));
    }

    #[test]
    fn test_finish_rejects_end_before_start() {
        let mut event = EventRecord::new("Run", "", 5_000);
        assert!(event.finish(4_000).is_err());
        assert!(event.finish(0).is_err());
        assert!(event.finish(9_000).is_ok());
        assert_eq!(event.duration(), Some(Duration::milliseconds(4_000)));
    }

    #[test]
    fn test_invalid_interval_is_reported_not_fatal() {
        let event = EventRecord::new("Odd", "", 5_000).with_end_time(1_000);
        assert!(!event.has_valid_interval());
    }

    #[test]
    fn test_touch_is_monotonic_against_future_stamps() {
        let future = ts("2999-01-01T00:00");
        let mut event = EventRecord::new("x", "", 0).with_updated_at(Some(future));
        event.touch();
        assert!(*event.updated_at().unwrap() > future);
    }

    #[test]
    fn test_apply_edit_reports_changes() {
        let mut event = EventRecord::new("Lunch", "", 0).with_updated_at(Some(ts("2020-01-01T10:00")));
        let unchanged = EventEdit {
            name: Some("Lunch".to_string()),
            ..Default::default()
        };
        assert!(!event.apply_edit(&unchanged));
        assert_eq!(event.updated_at(), Some(&ts("2020-01-01T10:00")));

        let edit = EventEdit {
            notes: Some("with Ana".to_string()),
            ..Default::default()
        };
        assert!(event.apply_edit(&edit));
        assert_eq!(event.notes(), "with Ana");
        assert!(*event.updated_at().unwrap() > ts("2020-01-01T10:00"));
    }

    #[test]
    fn test_apply_snapshot_keeps_identity_and_gps() {
        let mut event = EventRecord::new("Lunch", "", 0)
            .with_row_id(RowId::new(7))
            .with_gps(vec![GpsCoordinate::new(37.87, -122.26, 0)]);
        let uuid = event.uuid().clone();

        let snapshot = RemoteSnapshot {
            uuid: uuid.clone(),
            updated_at: ts("2020-01-01T11:00"),
            name: "Dinner".to_string(),
            notes: "late".to_string(),
            start_time: 10,
            end_time: 20,
            deleted: false,
        };
        event.apply_snapshot(&snapshot);

        assert_eq!(event.uuid(), &uuid);
        assert_eq!(event.row_id(), Some(RowId::new(7)));
        assert_eq!(event.name(), "Dinner");
        assert_eq!(event.end_time(), 20);
        assert_eq!(event.gps().len(), 1);
        assert!(event.is_persisted());
        assert_eq!(event.updated_at(), Some(&ts("2020-01-01T11:00")));
    }

    #[test]
    fn test_snapshot_deserialization_from_wire() {
        let json = serde_json::json!({
            "uuid": "A",
            "updated_at": "2020-01-01T11:00",
            "name": "Dinner",
            "notes": null,
            "startTime": 1_577_872_800_000_i64,
            "endTime": 0,
            "deleted": false
        });
        let snapshot: RemoteSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snapshot.uuid.as_str(), "A");
        assert_eq!(snapshot.notes, "");
        assert_eq!(snapshot.updated_at, ts("2020-01-01T11:00"));
    }

    #[test]
    fn test_duration_overflow_is_none() {
        let event = EventRecord::new("Odd", "", i64::MIN).with_end_time(1);
        assert_eq!(event.duration_ms(), None);
        assert_eq!(event.duration(), None);
    }

    #[test]
    fn test_inverted_interval_has_negative_duration() {
        let event = EventRecord::new("Odd", "", 5_000).with_end_time(1_000);
        assert_eq!(event.duration_ms(), Some(-4_000));
    }

    #[test]
    fn test_snapshot_missing_fields_fail() {
        for missing in ["name", "notes", "startTime", "endTime", "deleted"] {
            let mut json = serde_json::json!({
                "uuid": "A",
                "updated_at": "2020-01-01T11:00",
                "name": "Dinner",
                "notes": "",
                "startTime": 1,
                "endTime": 2,
                "deleted": false
            });
            json.as_object_mut().unwrap().remove(missing);
            assert!(
                serde_json::from_value::<RemoteSnapshot>(json).is_err(),
                "snapshot without {missing} was accepted"
            );
        }
    }

    #[test]
    fn test_snapshot_missing_uuid_fails() {
        let json = serde_json::json!({ "updated_at": "2020-01-01T11:00", "startTime": 0 });
        assert!(serde_json::from_value::<RemoteSnapshot>(json).is_err());
    }
}
