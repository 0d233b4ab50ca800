//! In-memory metric source.
//!
//! Serves fixed values, for manually tracked metrics (values typed into the
//! configuration) and for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use qualitywatch_types::Measurement;

use crate::{AdapterError, MetricSource};

/// A source that answers from a fixed table of subject values.
///
/// Subjects not in the table are reported as unavailable.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    values: HashMap<String, Measurement>,
    urls: HashMap<String, String>,
}

impl StaticSource {
    /// Create a new builder for a source called `name`.
    pub fn builder(name: impl Into<String>) -> StaticSourceBuilder {
        StaticSourceBuilder::new(name)
    }

    /// Number of subjects with a value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the source has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl MetricSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn value(&self, subject: &str) -> Result<Measurement, AdapterError> {
        Ok(self
            .values
            .get(subject)
            .cloned()
            .unwrap_or(Measurement::Unavailable))
    }

    fn url(&self, subject: &str) -> Option<String> {
        self.urls.get(subject).cloned()
    }
}

/// Builder for `StaticSource`.
#[derive(Debug)]
pub struct StaticSourceBuilder {
    name: String,
    values: HashMap<String, Measurement>,
    urls: HashMap<String, String>,
}

impl StaticSourceBuilder {
    /// Create a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
            urls: HashMap::new(),
        }
    }

    /// Set the value reported for a subject.
    pub fn value(mut self, subject: impl Into<String>, value: impl Into<Measurement>) -> Self {
        self.values.insert(subject.into(), value.into());
        self
    }

    /// Set the link reported for a subject.
    pub fn url(mut self, subject: impl Into<String>, url: impl Into<String>) -> Self {
        self.urls.insert(subject.into(), url.into());
        self
    }

    /// Build the source.
    pub fn build(self) -> StaticSource {
        StaticSource {
            name: self.name,
            values: self.values,
            urls: self.urls,
        }
    }
}
