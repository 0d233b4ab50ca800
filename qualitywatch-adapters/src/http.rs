//! Generic JSON-over-HTTP metric source.
//!
//! Many quality tools expose a small JSON API per subject. This source
//! requests `{endpoint}/{subject}` and reads one value out of the response
//! with a JSON pointer, which covers the common case without a dedicated
//! adapter.
//!
//! ## Value mapping
//!
//! - JSON number: a number (the legacy `-1` sentinel means unavailable)
//! - JSON string that parses as an RFC 3339 timestamp: a date
//! - other JSON string: an ordinal label
//! - `null`, missing pointer, or HTTP 404: unavailable
//!
//! ## Example
//!
//! ```rust,no_run
//! use qualitywatch_adapters::http::HttpJsonSource;
//! use qualitywatch_adapters::MetricSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = HttpJsonSource::builder("sonar")
//!         .endpoint("http://sonar.local:9000/api/measures")
//!         .pointer("/component/measures/0/value")
//!         .credentials("admin", "secret")
//!         .build()?;
//!
//!     let violations = source.value("my-project").await?;
//!     println!("violations: {violations:?}");
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qualitywatch_types::Measurement;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use crate::{AdapterError, MetricSource};

/// Source reading one JSON value per subject from an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpJsonSource {
    name: String,
    client: Client,
    endpoint: String,
    host: Option<String>,
    pointer: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpJsonSource {
    /// Create a new builder for a source called `name`.
    pub fn builder(name: impl Into<String>) -> HttpJsonSourceBuilder {
        HttpJsonSourceBuilder::new(name)
    }

    fn subject_url(&self, subject: &str) -> String {
        format!("{}/{}", self.endpoint, urlencoded(subject))
    }

    async fn fetch_document(&self, subject: &str) -> Result<Option<Value>, AdapterError> {
        let mut request = self.client.get(self.subject_url(subject));
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AdapterError::Auth("Invalid credentials".to_string()));
        }

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(AdapterError::Http(format!(
                "API returned status {}",
                response.status()
            )));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(Some(document))
    }
}

#[async_trait]
impl MetricSource for HttpJsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    async fn value(&self, subject: &str) -> Result<Measurement, AdapterError> {
        let Some(document) = self.fetch_document(subject).await? else {
            return Ok(Measurement::Unavailable);
        };
        json_to_measurement(document.pointer(&self.pointer))
    }

    fn url(&self, subject: &str) -> Option<String> {
        Some(self.subject_url(subject))
    }
}

/// Builder for `HttpJsonSource`.
#[derive(Debug)]
pub struct HttpJsonSourceBuilder {
    name: String,
    endpoint: Option<String>,
    pointer: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<Duration>,
}

impl HttpJsonSourceBuilder {
    /// Create a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            pointer: None,
            username: None,
            password: None,
            timeout: None,
        }
    }

    /// Set the base endpoint; subjects are appended as a path segment.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the JSON pointer to the value (default: "/value").
    pub fn pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }

    /// Set the username and password for basic authentication.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the client-side request timeout (default: 10 seconds).
    ///
    /// The fetcher applies its own timeout on top of this one.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the source.
    pub fn build(self) -> Result<HttpJsonSource, AdapterError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let host = Url::parse(&endpoint)
            .map_err(|e| AdapterError::Parse(format!("invalid endpoint {endpoint}: {e}")))?
            .host_str()
            .map(str::to_string);

        Ok(HttpJsonSource {
            name: self.name,
            client,
            endpoint,
            host,
            pointer: self.pointer.unwrap_or_else(|| "/value".to_string()),
            username: self.username,
            password: self.password,
        })
    }
}

/// Map the JSON value found at the pointer to a measurement.
fn json_to_measurement(value: Option<&Value>) -> Result<Measurement, AdapterError> {
    match value {
        None | Some(Value::Null) => Ok(Measurement::Unavailable),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Measurement::from_raw)
            .ok_or_else(|| AdapterError::Parse(format!("number out of range: {n}"))),
        Some(Value::String(s)) => Ok(match DateTime::parse_from_rfc3339(s) {
            Ok(date) => Measurement::Date(date.with_timezone(&Utc)),
            Err(_) => Measurement::Label(s.clone()),
        }),
        Some(other) => Err(AdapterError::Parse(format!(
            "expected a number or string, got {other}"
        ))),
    }
}

// URL encode a string for use in paths
fn urlencoded(s: &str) -> String {
    s.replace('%', "%25").replace('/', "%2F").replace(' ', "%20")
}
