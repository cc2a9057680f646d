//! Use cases (interactors) for evtrack
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces. Use cases are thin coordinators
//! that delegate business rules to domain methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`Reconciler`] - Merges a poll response into the local store
//! - [`EventService`] - Local event mutations and the sync tasks they trigger

pub mod reconcile;
pub mod track_events;

#[cfg(test)]
pub(crate) mod testing;

pub use reconcile::{MergeReport, Reconciler, SnapshotOutcome};
pub use track_events::EventService;
