//! Error types for metric sources.

use thiserror::Error;

/// Errors a metric source can hit while fetching a value.
///
/// These never reach the status engine: the [`Fetcher`](crate::Fetcher)
/// logs them and resolves the fetch to `Measurement::Unavailable`.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The host recently timed out and is not being called this run.
    #[error("Circuit open for host {0}")]
    CircuitOpen(String),

    /// The source cannot answer this kind of request.
    #[error("Not supported: {0}")]
    Unsupported(String),
}

impl AdapterError {
    /// Whether this error should trip the circuit breaker for the host.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AdapterError::Timeout)
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}
