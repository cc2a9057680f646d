//! Classifier feature extraction
//!
//! The prediction subsystem learns event names from a handful of features:
//! when the event started (hour of day, day of week, in the local zone),
//! where it started (first GPS fix) and the name itself, which is the class.
//! Only extraction lives here; the statistical model is external.

use std::collections::BTreeSet;

use chrono::{Datelike, Local, TimeZone, Timelike};
use serde::Serialize;

use super::errors::SyncError;
use super::event::EventRecord;

/// Set of event names the classifier knows about
///
/// An empty catalog accepts every name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameCatalog {
    names: BTreeSet<String>,
}

impl NameCatalog {
    /// Builds a catalog, ignoring blank entries and surrounding whitespace
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    /// Whether `name` is a valid class value
    pub fn contains(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.contains(name.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// One classifier training instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFeatures {
    /// 0-23
    pub hour_of_day: u32,
    /// 1 = Monday .. 7 = Sunday
    pub day_of_week: u32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Class value
    pub name: String,
}

impl EventFeatures {
    /// Extracts features using the system's local time zone
    ///
    /// See [`EventFeatures::extract_in`].
    pub fn extract(
        record: &EventRecord,
        catalog: &NameCatalog,
    ) -> Result<Option<Self>, SyncError> {
        Self::extract_in(record, catalog, &Local)
    }

    /// Extracts features with the start time rendered in `tz`
    ///
    /// Returns `Ok(None)` for unnamed events, which are not usable as
    /// training data.
    ///
    /// # Errors
    /// Returns [`SyncError::UnknownAttribute`] if the name is not in `catalog`
    pub fn extract_in<Tz: TimeZone>(
        record: &EventRecord,
        catalog: &NameCatalog,
        tz: &Tz,
    ) -> Result<Option<Self>, SyncError> {
        if !record.is_named() {
            return Ok(None);
        }

        let name = record.name().trim();
        if !catalog.contains(name) {
            return Err(SyncError::UnknownAttribute(name.to_string()));
        }

        let start = tz.timestamp_millis_opt(record.start_time()).single().ok_or_else(|| {
            SyncError::Parse(format!("start time {} out of range", record.start_time()))
        })?;
        let first_fix = record.gps().first();

        Ok(Some(Self {
            hour_of_day: start.hour(),
            day_of_week: start.weekday().number_from_monday(),
            latitude: first_fix.map(|g| g.latitude),
            longitude: first_fix.map(|g| g.longitude),
            name: name.to_string(),
        }))
    }
}
