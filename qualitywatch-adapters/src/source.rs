//! The contract every metric source implements.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use qualitywatch_types::Measurement;

use crate::AdapterError;

/// One row of supporting detail for a measurement (e.g. the offending
/// issues behind a count), as column name to cell text.
pub type DetailRow = BTreeMap<String, String>;

/// A source of raw measurements for subjects (projects, products, teams).
///
/// Implementations wrap one external tool. They must report ordinary absence
/// of data as `Ok(Measurement::Unavailable)`; errors are for failures such as
/// unreachable hosts or unparsable responses.
///
/// # Example
///
/// ```
/// use qualitywatch_adapters::{MetricSource, StaticSource};
/// use qualitywatch_types::Measurement;
///
/// # tokio_test::block_on(async {
/// let source = StaticSource::builder("sonar")
///     .value("project-a", Measurement::Number(12.0))
///     .build();
///
/// let value = source.value("project-a").await.unwrap();
/// assert_eq!(value, Measurement::Number(12.0));
///
/// let absent = source.value("project-b").await.unwrap();
/// assert!(!absent.is_available());
/// # });
/// ```
#[async_trait]
pub trait MetricSource: Send + Sync + Debug {
    /// Name the source is referred to by in configuration.
    fn name(&self) -> &str;

    /// Host this source talks to, used to key the circuit breaker.
    ///
    /// In-process sources return `None` and are never short-circuited.
    fn host(&self) -> Option<&str> {
        None
    }

    /// Fetch the current value for one subject.
    async fn value(&self, subject: &str) -> Result<Measurement, AdapterError>;

    /// Supporting rows behind the value, if the source has any.
    async fn detail_rows(&self, _subject: &str) -> Result<Vec<DetailRow>, AdapterError> {
        Ok(Vec::new())
    }

    /// Link to the subject in the source tool.
    fn url(&self, _subject: &str) -> Option<String> {
        None
    }
}
