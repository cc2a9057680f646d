//! Sync requests and tasks
//!
//! [`RequestKind`] is the closed set of operations the server understands,
//! each bound to a fixed endpoint path. A [`SyncTask`] pairs a kind with the
//! event it carries (for push operations) and knows how to render the wire
//! body for its request.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::errors::DomainError;
use super::event::{EventRecord, GpsCoordinate};
use super::newtypes::{EventId, UpdatedAt, Watermark};

// ============================================================================
// RequestKind
// ============================================================================

/// One of the five synchronization operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Announce this device to the server (first run)
    Register,
    /// Push a newly finished event
    Upload,
    /// Push an edited event
    Update,
    /// Push a tombstone
    Delete,
    /// Pull remote changes since the last watermark
    Poll,
}

impl RequestKind {
    /// All kinds, in declaration order
    pub const ALL: [RequestKind; 5] = [
        RequestKind::Register,
        RequestKind::Upload,
        RequestKind::Update,
        RequestKind::Delete,
        RequestKind::Poll,
    ];

    /// Fixed endpoint path, relative to the server root
    ///
    /// Upload and Update share the bulk upload endpoint; the server
    /// distinguishes them by uuid.
    pub fn endpoint(&self) -> &'static str {
        match self {
            RequestKind::Register => "users/init",
            RequestKind::Upload | RequestKind::Update => "events/upload_bulk",
            RequestKind::Delete => "events/delete",
            RequestKind::Poll => "events/poll",
        }
    }

    /// Full URL of this kind's endpoint under `base_url`
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.endpoint())
    }

    /// Whether the kind transmits an event record
    pub fn requires_payload(&self) -> bool {
        matches!(
            self,
            RequestKind::Upload | RequestKind::Update | RequestKind::Delete
        )
    }

    /// Whether a failed attempt is worth retrying from the outbox
    ///
    /// Polls are not retried: the next scheduled poll re-fetches from the
    /// same watermark.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RequestKind::Poll)
    }

    /// Stable lowercase name (storage and metrics label)
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Register => "register",
            RequestKind::Upload => "upload",
            RequestKind::Update => "update",
            RequestKind::Delete => "delete",
            RequestKind::Poll => "poll",
        }
    }
}

impl Display for RequestKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DomainError::UnknownRequestKind(s.to_string()))
    }
}

// ============================================================================
// SyncTask
// ============================================================================

/// Immutable unit of sync work
///
/// Push tasks carry a full snapshot of the event taken at enqueue time;
/// there is no field-level diffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    kind: RequestKind,
    payload: Option<EventRecord>,
}

impl SyncTask {
    /// Creates a task, checking that the payload matches the kind
    ///
    /// # Errors
    /// Returns error if a push kind has no payload or a Register/Poll has one
    pub fn new(kind: RequestKind, payload: Option<EventRecord>) -> Result<Self, DomainError> {
        match (kind.requires_payload(), payload.is_some()) {
            (true, false) => Err(DomainError::InvalidTaskPayload {
                kind: kind.to_string(),
                reason: "an event payload is required".to_string(),
            }),
            (false, true) => Err(DomainError::InvalidTaskPayload {
                kind: kind.to_string(),
                reason: "this request carries no event".to_string(),
            }),
            _ => Ok(Self { kind, payload }),
        }
    }

    /// Device registration task
    pub fn register() -> Self {
        Self {
            kind: RequestKind::Register,
            payload: None,
        }
    }

    /// Push of a newly finished event
    pub fn upload(event: EventRecord) -> Self {
        Self {
            kind: RequestKind::Upload,
            payload: Some(event),
        }
    }

    /// Push of an edited event
    pub fn update(event: EventRecord) -> Self {
        Self {
            kind: RequestKind::Update,
            payload: Some(event),
        }
    }

    /// Push of a tombstone
    pub fn delete(event: EventRecord) -> Self {
        Self {
            kind: RequestKind::Delete,
            payload: Some(event),
        }
    }

    /// Pull of remote changes
    pub fn poll() -> Self {
        Self {
            kind: RequestKind::Poll,
            payload: None,
        }
    }

    /// The request kind
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// The event carried by a push task
    pub fn payload(&self) -> Option<&EventRecord> {
        self.payload.as_ref()
    }

    /// Renders the JSON request body
    ///
    /// - push kinds: the full event (see [`PushPayload`])
    /// - Poll: `{"pollTime": <watermark>}`, or `{}` before the first poll
    /// - Register: `{}`
    ///
    /// # Errors
    /// Returns error if the event cannot be serialized
    pub fn request_body(&self, watermark: Option<&Watermark>) -> Result<Vec<u8>, DomainError> {
        let body = match (&self.kind, &self.payload) {
            (RequestKind::Poll, _) => match watermark {
                Some(wm) => json!({ "pollTime": wm.as_str() }),
                None => json!({}),
            },
            (RequestKind::Register, _) => json!({}),
            (kind, Some(event)) => serde_json::to_value(PushPayload::from(event)).map_err(|e| {
                DomainError::InvalidTaskPayload {
                    kind: kind.to_string(),
                    reason: e.to_string(),
                }
            })?,
            (kind, None) => {
                return Err(DomainError::InvalidTaskPayload {
                    kind: kind.to_string(),
                    reason: "an event payload is required".to_string(),
                })
            }
        };

        serde_json::to_vec(&body).map_err(|e| DomainError::InvalidTaskPayload {
            kind: self.kind.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Display for SyncTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(event) => write!(f, "{} {}", self.kind, event.uuid()),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Wire form of an event in push requests
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload<'a> {
    pub uuid: &'a EventId,
    pub name: &'a str,
    pub notes: &'a str,
    pub start_time: i64,
    pub end_time: i64,
    pub deleted: bool,
    pub updated_at: Option<&'a UpdatedAt>,
    pub gps: &'a [GpsCoordinate],
}

impl<'a> From<&'a EventRecord> for PushPayload<'a> {
    fn from(event: &'a EventRecord) -> Self {
        Self {
            uuid: event.uuid(),
            name: event.name(),
            notes: event.notes(),
            start_time: event.start_time(),
            end_time: event.end_time(),
            deleted: event.is_deleted(),
            updated_at: event.updated_at(),
            gps: event.gps(),
        }
    }
}
