//! Domain entities and business logic
//!
//! This module contains the core domain types for evtrack:
//! - Newtypes for identifiers, timestamps and the poll watermark
//! - The synchronizable event record and remote snapshots
//! - Sync request kinds and tasks
//! - Classifier feature extraction
//! - Domain-specific error types

pub mod errors;
pub mod event;
pub mod features;
pub mod newtypes;
pub mod task;

// Re-export commonly used types
pub use errors::{DomainError, SyncError, TransportError};
pub use event::{EventEdit, EventRecord, GpsCoordinate, RemoteSnapshot};
pub use features::{EventFeatures, NameCatalog};
pub use newtypes::*;
pub use task::{PushPayload, RequestKind, SyncTask};
