//! Device settings ports
//!
//! Two small key/value concerns backed by the same settings store in
//! practice, kept as separate traits so each consumer only sees what it
//! needs: the reconciler owns the watermark, the registration use case
//! owns the device flag.

use crate::domain::Watermark;

/// Persisted cursor of the last fully merged poll
#[async_trait::async_trait]
pub trait IPollWatermark: Send + Sync {
    /// The current watermark, `None` before the first successful poll
    async fn get(&self) -> anyhow::Result<Option<Watermark>>;

    /// Replaces the watermark
    async fn set(&self, watermark: &Watermark) -> anyhow::Result<()>;
}

/// Whether this device has announced itself to the server
#[async_trait::async_trait]
pub trait IDeviceRegistry: Send + Sync {
    async fn is_registered(&self) -> anyhow::Result<bool>;

    async fn mark_registered(&self) -> anyhow::Result<()>;
}
