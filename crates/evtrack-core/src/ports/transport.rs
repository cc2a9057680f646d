//! Transport port
//!
//! The sync core only ever needs one primitive from the network: POST a
//! body to a URL and get back the status and body. Errors are typed
//! ([`TransportError`]) because the worker's retry policy depends on the
//! failure class.

use crate::domain::TransportError;

/// Raw server answer to a successful POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Port trait for the HTTP POST primitive
///
/// Implementations return `Err(TransportError::Status { .. })` for any
/// non-2xx answer, so `Ok` always means the server accepted the request.
#[async_trait::async_trait]
pub trait ITransport: Send + Sync {
    /// POSTs `body` (JSON) to `url`
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<TransportResponse, TransportError>;
}
