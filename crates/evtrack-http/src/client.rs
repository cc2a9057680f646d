//! reqwest-backed transport
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use evtrack_core::ports::ITransport;
//! use evtrack_http::HttpTransport;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let transport = HttpTransport::new(Duration::from_secs(15))?;
//! let response = transport
//!     .post("http://192.168.0.105:3001/events/poll", b"{}".to_vec())
//!     .await?;
//! println!("{} bytes", response.body.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use evtrack_core::{
    config::ServerConfig,
    domain::TransportError,
    ports::{ITransport, TransportResponse},
};
use reqwest::{header, Client};
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!("evtrack/", env!("CARGO_PKG_VERSION"));

/// Longest response body kept in a [`TransportError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Builds and validates the server root URL from configuration
///
/// The result always ends with `/` so endpoint paths join under it.
pub fn resolve_base_url(server: &ServerConfig) -> Result<Url> {
    let url = Url::parse(&server.base_url())
        .with_context(|| format!("Invalid server address {}", server.base_url()))?;
    if url.cannot_be_a_base() {
        anyhow::bail!("Server address {} cannot be used as a base URL", url);
    }
    Ok(url)
}

/// HTTP client for the sync server
///
/// Wraps `reqwest::Client` with a per-request timeout. Every request is a
/// JSON POST; non-2xx answers are reported as [`TransportError::Status`].
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Wraps an existing client (custom TLS, proxies...)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Unreachable(err.to_string())
    }
}

#[async_trait::async_trait]
impl ITransport for HttpTransport {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<TransportResponse, TransportError> {
        debug!(url, bytes = body.len(), "POST");

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(classify)?;

        if !status.is_success() {
            let mut text = String::from_utf8_lossy(&bytes).into_owned();
            if text.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            warn!(url, status = status.as_u16(), "Server rejected request");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!(url, status = status.as_u16(), bytes = bytes.len(), "Response received");
        Ok(TransportResponse::new(status.as_u16(), bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_default_base_url() {
        let url = resolve_base_url(&ServerConfig::default()).unwrap();
        assert_eq!(url.as_str(), "http://192.168.0.105:3001/");
        assert_eq!(
            url.join("events/poll").unwrap().as_str(),
            "http://192.168.0.105:3001/events/poll"
        );
    }

    #[test]
    fn test_resolve_rejects_garbage_host() {
        let server = ServerConfig {
            host: "bad host".to_string(),
            ..ServerConfig::default()
        };
        assert!(resolve_base_url(&server).is_err());
    }
}
