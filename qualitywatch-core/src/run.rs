//! Run orchestration: fetch everything, evaluate, aggregate, append once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use qualitywatch_adapters::{FetchKey, FetchRequest, Fetcher, MetricSource};
use qualitywatch_types::{
    meta_metric_ids, Bucket, HistoryRecord, Measurement, RecordValue, Status,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::RunCache;
use crate::history::{HistoryStore, TrendPoint};
use crate::meta::{BucketCounts, MetaMetrics};
use crate::{ConfigurationError, HistoryError, MetricDefinition};

/// One metric's outcome in a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResult {
    pub id: String,
    pub name: String,
    pub value: RecordValue,
    pub status: Status,
    /// When the metric entered `status` without interruption.
    pub since: DateTime<Utc>,
    pub norm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub date: DateTime<Utc>,
    pub metrics: Vec<MetricResult>,
    pub meta: Vec<MetricResult>,
    pub counts: BucketCounts,
}

impl RunReport {
    /// Find a regular or meta-metric result by id.
    pub fn get(&self, id: &str) -> Option<&MetricResult> {
        self.metrics
            .iter()
            .chain(self.meta.iter())
            .find(|result| result.id == id)
    }
}

/// Evaluates a set of metrics against their sources and records the outcome.
#[derive(Debug)]
pub struct Runner {
    sources: HashMap<String, Arc<dyn MetricSource>>,
    metrics: Vec<MetricDefinition>,
    meta: MetaMetrics,
    fetcher: Fetcher,
    history: HistoryStore,
}

impl Runner {
    /// Create a builder writing to `history`.
    pub fn builder(history: HistoryStore) -> RunnerBuilder {
        RunnerBuilder::new(history)
    }

    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Perform one run at `now`.
    ///
    /// Every fetch completes or times out before anything is evaluated, and
    /// the history is appended exactly once, after every status is final.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport, HistoryError> {
        self.fetcher.begin_run();

        let requests: Vec<FetchRequest> = self
            .metrics
            .iter()
            .filter_map(|def| def.source())
            .filter_map(|binding| {
                self.sources
                    .get(&binding.source)
                    .map(|source| FetchRequest::new(source.clone(), binding.subject.clone()))
            })
            .collect();
        let fetched = self.fetcher.fetch_all(requests).await;

        let previous = self.history.last_record()?;
        // A renamed metric carries on from the first of its ids found in
        // the previous record.
        let since = |ids: &[&str], status: Status| {
            previous
                .as_ref()
                .and_then(|record| {
                    ids.iter()
                        .find(|id| record.get(id).is_some())
                        .map(|id| record.status_start_date(id, status, now))
                })
                .unwrap_or(now)
        };

        let cache = RunCache::new();
        let mut metrics = Vec::with_capacity(self.metrics.len());
        for def in &self.metrics {
            let measurement = def.source().map(|binding| {
                fetched
                    .get(&FetchKey::new(&binding.source, &binding.subject))
                    .cloned()
                    .unwrap_or(Measurement::Unavailable)
            });
            let evaluation = cache.evaluate(def, measurement.as_ref(), now);
            let url = def.source().and_then(|binding| {
                self.sources
                    .get(&binding.source)
                    .and_then(|source| source.url(&binding.subject))
            });

            metrics.push(MetricResult {
                id: def.id().to_string(),
                name: def.name().to_string(),
                since: since(&def.history_ids(), evaluation.status),
                value: evaluation.value,
                status: evaluation.status,
                norm: def.norm(now),
                url,
            });
        }

        let counts = BucketCounts::from_statuses(cache.statuses());
        let meta = self
            .meta
            .evaluate(&counts, now)
            .into_iter()
            .map(|result| {
                let norm = self
                    .meta
                    .definition(result.bucket)
                    .map(|def| def.norm(now))
                    .unwrap_or_default();
                MetricResult {
                    id: result.id().to_string(),
                    name: format!("Percentage of {} metrics", result.bucket),
                    since: since(&[result.id()], result.evaluation.status),
                    value: result.evaluation.value,
                    status: result.evaluation.status,
                    norm,
                    url: None,
                }
            })
            .collect::<Vec<_>>();

        let record = metrics
            .iter()
            .chain(meta.iter())
            .fold(HistoryRecord::builder(now), |builder, result| {
                builder.tracked(
                    result.id.clone(),
                    result.value.clone(),
                    result.status,
                    result.since,
                )
            })
            .build();
        self.history.append(&record)?;

        info!(
            metrics = metrics.len(),
            green = counts.count(Bucket::Green),
            yellow = counts.count(Bucket::Yellow),
            red = counts.count(Bucket::Red),
            grey = counts.count(Bucket::Grey),
            missing = counts.count(Bucket::Missing),
            "Run complete"
        );

        Ok(RunReport {
            date: now,
            metrics,
            meta,
            counts,
        })
    }

    /// Recent values of a metric, following its former ids.
    pub fn trend(&self, id: &str, window: usize) -> Result<Vec<TrendPoint>, HistoryError> {
        match self.metrics.iter().find(|def| def.id() == id) {
            Some(def) => self.history.recent(&def.history_ids(), window),
            None => self.history.recent(&[id], window),
        }
    }
}

/// Builder for `Runner`.
#[derive(Debug)]
pub struct RunnerBuilder {
    sources: HashMap<String, Arc<dyn MetricSource>>,
    metrics: Vec<MetricDefinition>,
    meta: Option<MetaMetrics>,
    fetcher: Option<Fetcher>,
    history: HistoryStore,
}

impl RunnerBuilder {
    /// Create a new builder.
    pub fn new(history: HistoryStore) -> Self {
        Self {
            sources: HashMap::new(),
            metrics: Vec::new(),
            meta: None,
            fetcher: None,
            history,
        }
    }

    /// Register a source under its own name.
    pub fn source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.sources.insert(source.name().to_string(), source);
        self
    }

    /// Add a metric.
    pub fn metric(mut self, metric: MetricDefinition) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Add several metrics.
    pub fn metrics(mut self, metrics: impl IntoIterator<Item = MetricDefinition>) -> Self {
        self.metrics.extend(metrics);
        self
    }

    /// Use custom meta-metric thresholds.
    pub fn meta(mut self, meta: MetaMetrics) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Use a configured fetcher (default: `Fetcher::default()`).
    pub fn fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Validate and build the runner.
    pub fn build(self) -> Result<Runner, ConfigurationError> {
        let reserved = meta_metric_ids();
        let mut seen = HashSet::new();

        for def in &self.metrics {
            if reserved.contains(&def.id()) {
                return Err(ConfigurationError::ReservedId(def.id().to_string()));
            }
            if !seen.insert(def.id()) {
                return Err(ConfigurationError::DuplicateMetric(def.id().to_string()));
            }
            if let Some(binding) = def.source() {
                if !self.sources.contains_key(&binding.source) {
                    return Err(ConfigurationError::UnknownSource {
                        metric: def.id().to_string(),
                        source_name: binding.source.clone(),
                    });
                }
            }
        }

        let meta = match self.meta {
            Some(meta) => meta,
            None => MetaMetrics::new()?,
        };

        debug!(
            sources = self.sources.len(),
            metrics = self.metrics.len(),
            "Runner configured"
        );

        Ok(Runner {
            sources: self.sources,
            metrics: self.metrics,
            meta,
            fetcher: self.fetcher.unwrap_or_default(),
            history: self.history,
        })
    }
}
