//! Meta-metrics: the share of metrics in each status bucket.
//!
//! Computed after every other metric of a run has its final status, and
//! evaluated by the status engine like any other percentage metric.

use chrono::{DateTime, Utc};
use qualitywatch_types::{Bucket, Measurement, Status};
use serde::Serialize;

use crate::status::{evaluate, Evaluation};
use crate::{ConfigurationError, Direction, MetricDefinition, Targets, ZeroOverZero};

/// Number of metrics per bucket in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BucketCounts {
    green: usize,
    red: usize,
    yellow: usize,
    grey: usize,
    missing: usize,
}

impl BucketCounts {
    /// Count statuses into buckets.
    pub fn from_statuses(statuses: impl IntoIterator<Item = Status>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            *counts.slot(status.bucket()) += 1;
        }
        counts
    }

    fn slot(&mut self, bucket: Bucket) -> &mut usize {
        match bucket {
            Bucket::Green => &mut self.green,
            Bucket::Red => &mut self.red,
            Bucket::Yellow => &mut self.yellow,
            Bucket::Grey => &mut self.grey,
            Bucket::Missing => &mut self.missing,
        }
    }

    pub fn count(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::Green => self.green,
            Bucket::Red => self.red,
            Bucket::Yellow => self.yellow,
            Bucket::Grey => self.grey,
            Bucket::Missing => self.missing,
        }
    }

    pub fn total(&self) -> usize {
        self.green + self.red + self.yellow + self.grey + self.missing
    }

    /// Rounded percentage of metrics in `bucket`, `None` without metrics.
    pub fn percentage(&self, bucket: Bucket) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some((100.0 * self.count(bucket) as f64 / total as f64).round())
    }
}

/// A meta-metric's evaluation in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaEvaluation {
    pub bucket: Bucket,
    pub evaluation: Evaluation,
}

impl MetaEvaluation {
    pub fn id(&self) -> &'static str {
        self.bucket.meta_metric_id()
    }
}

/// The five meta-metric definitions.
#[derive(Debug, Clone)]
pub struct MetaMetrics {
    definitions: Vec<(Bucket, MetricDefinition)>,
}

impl MetaMetrics {
    /// Meta-metrics with the default thresholds: green at least 100% (low
    /// 90%), every other bucket at most 0% (low 10%).
    pub fn new() -> Result<Self, ConfigurationError> {
        let definitions = Bucket::ALL
            .into_iter()
            .map(|bucket| Ok((bucket, definition(bucket, default_targets(bucket))?)))
            .collect::<Result<_, ConfigurationError>>()?;
        Ok(Self { definitions })
    }

    /// Replace the thresholds of one bucket's meta-metric.
    pub fn with_targets(
        mut self,
        bucket: Bucket,
        targets: Targets,
    ) -> Result<Self, ConfigurationError> {
        let replacement = definition(bucket, targets)?;
        for (b, def) in &mut self.definitions {
            if *b == bucket {
                *def = replacement;
                break;
            }
        }
        Ok(self)
    }

    /// The definition for one bucket.
    pub fn definition(&self, bucket: Bucket) -> Option<&MetricDefinition> {
        self.definitions
            .iter()
            .find(|(b, _)| *b == bucket)
            .map(|(_, def)| def)
    }

    /// Evaluate every meta-metric from the final statuses of a run's regular
    /// metrics. Without any metrics every meta-metric is `missing`.
    pub fn evaluate(&self, counts: &BucketCounts, now: DateTime<Utc>) -> Vec<MetaEvaluation> {
        self.definitions
            .iter()
            .map(|(bucket, def)| {
                let measurement = counts
                    .percentage(*bucket)
                    .map_or(Measurement::Unavailable, Measurement::Number);
                MetaEvaluation {
                    bucket: *bucket,
                    evaluation: evaluate(def, Some(&measurement), now),
                }
            })
            .collect()
    }
}

fn default_targets(bucket: Bucket) -> Targets {
    match bucket {
        Bucket::Green => Targets::new(100.0, 90.0),
        _ => Targets::new(0.0, 10.0),
    }
}

fn definition(bucket: Bucket, targets: Targets) -> Result<MetricDefinition, ConfigurationError> {
    let direction = match bucket {
        Bucket::Green => Direction::higher_percentage(ZeroOverZero::Zero),
        _ => Direction::lower_percentage(ZeroOverZero::Zero),
    };
    MetricDefinition::builder(bucket.meta_metric_id())
        .name(format!("Percentage of {bucket} metrics"))
        .unit("%")
        .direction(direction)
        .targets(targets)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qualitywatch_types::RecordValue;

    fn statuses(counts: &[(Status, usize)]) -> Vec<Status> {
        counts
            .iter()
            .flat_map(|(status, n)| std::iter::repeat(*status).take(*n))
            .collect()
    }

    fn find(results: &[MetaEvaluation], bucket: Bucket) -> &Evaluation {
        &results.iter().find(|r| r.bucket == bucket).unwrap().evaluation
    }

    #[test]
    fn counts_merge_related_statuses() {
        let counts = BucketCounts::from_statuses(statuses(&[
            (Status::Perfect, 2),
            (Status::Green, 1),
            (Status::Missing, 1),
            (Status::MissingSource, 2),
        ]));

        assert_eq!(counts.count(Bucket::Green), 3);
        assert_eq!(counts.count(Bucket::Missing), 3);
        assert_eq!(counts.total(), 6);
    }

    #[test]
    fn percentages_are_rounded() {
        let counts = BucketCounts::from_statuses(statuses(&[
            (Status::Green, 1),
            (Status::Red, 2),
        ]));
        assert_eq!(counts.percentage(Bucket::Green), Some(33.0));
        assert_eq!(counts.percentage(Bucket::Red), Some(67.0));
        assert_eq!(counts.percentage(Bucket::Grey), Some(0.0));
    }

    #[test]
    fn seventy_twenty_ten() {
        let counts = BucketCounts::from_statuses(statuses(&[
            (Status::Green, 4),
            (Status::Perfect, 3),
            (Status::Yellow, 2),
            (Status::Red, 1),
        ]));
        let results = MetaMetrics::new().unwrap().evaluate(&counts, Utc::now());

        assert_eq!(results.len(), 5);
        assert_eq!(find(&results, Bucket::Green).value, RecordValue::Number(70.0));
        assert_eq!(find(&results, Bucket::Yellow).value, RecordValue::Number(20.0));
        assert_eq!(find(&results, Bucket::Red).value, RecordValue::Number(10.0));
        assert_eq!(find(&results, Bucket::Grey).value, RecordValue::Number(0.0));

        assert_eq!(find(&results, Bucket::Green).status, Status::Red);
        assert_eq!(find(&results, Bucket::Red).status, Status::Yellow);
        assert_eq!(find(&results, Bucket::Yellow).status, Status::Red);
        assert_eq!(find(&results, Bucket::Grey).status, Status::Perfect);
    }

    #[test]
    fn no_metrics_means_every_meta_metric_is_missing() {
        let results = MetaMetrics::new()
            .unwrap()
            .evaluate(&BucketCounts::default(), Utc::now());

        assert!(results.iter().all(|r| r.evaluation.status == Status::Missing));
    }

    #[test]
    fn thresholds_can_be_overridden() {
        let meta = MetaMetrics::new()
            .unwrap()
            .with_targets(Bucket::Green, Targets::new(60.0, 50.0))
            .unwrap();
        let counts = BucketCounts::from_statuses(statuses(&[
            (Status::Green, 7),
            (Status::Red, 3),
        ]));

        let results = meta.evaluate(&counts, Utc::now());
        assert_eq!(find(&results, Bucket::Green).status, Status::Green);
        assert_eq!(
            meta.definition(Bucket::Green).unwrap().id(),
            "GreenMetaMetric"
        );
    }

    #[test]
    fn inconsistent_override_is_rejected() {
        let result = MetaMetrics::new()
            .unwrap()
            .with_targets(Bucket::Red, Targets::new(10.0, 0.0));
        assert!(matches!(
            result,
            Err(ConfigurationError::InconsistentTargets { .. })
        ));
    }
}
