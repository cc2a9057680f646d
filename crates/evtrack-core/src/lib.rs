//! evtrack Core - Domain logic and sync rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `EventRecord`, `SyncTask`, `RequestKind`, `RemoteSnapshot`
//! - **Use cases** - `Reconciler` (poll merge), `EventService` (local mutations)
//! - **Port definitions** - Traits for adapters: `ILocalStore`, `ITransport`,
//!   `IPollWatermark`, `IDeviceRegistry`, `IOutbox`, `ITaskSink`
//! - **Configuration** - YAML-backed `Config` with validation
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
