//! Relay configuration
//!
//! Validated construction parameters for a relay session.

use crate::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default chunk emission interval in milliseconds
pub const DEFAULT_CHUNK_INTERVAL_MS: u64 = 1000;

/// Default bound on waiting for teardown steps (drain, stream/connection close)
pub const DEFAULT_CLOSE_TIMEOUT_MS: u64 = 5000;

/// Configuration for a relay session
///
/// Construction validates all inputs and fails fast with no side effects;
/// a `RelayConfig` value is always valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Server URL the transport connects to
    pub url: String,

    /// MIME type the source is configured with and recordings are tagged with
    pub mime_type: String,

    /// Default chunk emission interval
    #[serde(with = "duration_ms", rename = "chunkIntervalMs")]
    pub chunk_interval: Duration,

    /// Bound on each teardown wait so `stop()` cannot hang on a dead peer
    #[serde(with = "duration_ms", rename = "closeTimeoutMs")]
    pub close_timeout: Duration,
}

impl RelayConfig {
    /// Create a validated configuration
    pub fn new(url: impl Into<String>, mime_type: impl Into<String>) -> RelayResult<Self> {
        let url = url.into();
        let mime_type = mime_type.into();

        validate_url(&url)?;
        validate_mime_type(&mime_type)?;

        Ok(Self {
            url,
            mime_type,
            chunk_interval: Duration::from_millis(DEFAULT_CHUNK_INTERVAL_MS),
            close_timeout: Duration::from_millis(DEFAULT_CLOSE_TIMEOUT_MS),
        })
    }

    /// Override the default chunk emission interval
    pub fn with_chunk_interval(mut self, interval: Duration) -> Self {
        self.chunk_interval = interval;
        self
    }

    /// Override the teardown wait bound
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

/// Validate the server URL: https scheme with a non-empty host
fn validate_url(url: &str) -> RelayResult<()> {
    if url.is_empty() {
        return Err(RelayError::Config("server URL is empty".to_string()));
    }

    let rest = url
        .strip_prefix("https://")
        .ok_or_else(|| RelayError::Config(format!("server URL must use https scheme: {}", url)))?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() {
        return Err(RelayError::Config(format!("server URL has no host: {}", url)));
    }

    Ok(())
}

/// Validate the MIME type: `type/subtype`, optionally with parameters
fn validate_mime_type(mime_type: &str) -> RelayResult<()> {
    let essence = mime_type.split(';').next().unwrap_or("");
    let mut parts = essence.splitn(2, '/');
    let kind = parts.next().unwrap_or("");
    let subtype = parts.next().unwrap_or("");

    if kind.trim().is_empty() || subtype.trim().is_empty() {
        return Err(RelayError::Config(format!(
            "invalid MIME type: {:?}",
            mime_type
        )));
    }

    Ok(())
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
