//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ILocalStore`] - Durable keyed storage of event records
//! - [`ITransport`] - A single HTTP POST to the sync server
//! - [`IPollWatermark`] - The "last successful poll" cursor
//! - [`IDeviceRegistry`] - First-run registration flag
//! - [`IOutbox`] - Durable FIFO of undelivered sync tasks
//! - [`ITaskSink`] - Where use cases hand off sync tasks

pub mod local_store;
pub mod outbox;
pub mod settings;
pub mod task_sink;
pub mod transport;

pub use local_store::ILocalStore;
pub use outbox::{IOutbox, OutboxEntry, OutboxStatus};
pub use settings::{IDeviceRegistry, IPollWatermark};
pub use task_sink::ITaskSink;
pub use transport::{ITransport, TransportResponse};
