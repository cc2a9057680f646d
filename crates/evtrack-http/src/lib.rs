//! evtrack HTTP - Transport adapter
//!
//! Implements the `ITransport` port from `evtrack-core` over `reqwest`.
//! The sync protocol only ever POSTs JSON, so the adapter is a single
//! operation plus error classification.
//!
//! ## Modules
//!
//! - [`client`] - [`HttpTransport`] and base URL resolution

pub mod client;

pub use client::{resolve_base_url, HttpTransport};
