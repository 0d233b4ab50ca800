//! Per-run evaluation cache.
//!
//! A run evaluates each metric once; the meta-metric aggregator and the
//! report read the cached result instead of evaluating again. A cache is
//! created per run and dropped with it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use qualitywatch_types::{Measurement, Status};

use crate::metric::MetricDefinition;
use crate::status::{evaluate, Evaluation};

/// Evaluations of one run, keyed by metric id.
#[derive(Debug, Default)]
pub struct RunCache {
    evaluations: RwLock<HashMap<String, Evaluation>>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `definition`, or return the cached evaluation for its id.
    pub fn evaluate(
        &self,
        definition: &MetricDefinition,
        fetched: Option<&Measurement>,
        now: DateTime<Utc>,
    ) -> Evaluation {
        if let Some(cached) = self.evaluations.read().get(definition.id()) {
            return cached.clone();
        }

        let mut evaluations = self.evaluations.write();
        evaluations
            .entry(definition.id().to_string())
            .or_insert_with(|| evaluate(definition, fetched, now))
            .clone()
    }

    /// The cached evaluation for a metric id.
    pub fn get(&self, id: &str) -> Option<Evaluation> {
        self.evaluations.read().get(id).cloned()
    }

    /// Statuses of every cached evaluation.
    pub fn statuses(&self) -> Vec<Status> {
        self.evaluations.read().values().map(|e| e.status).collect()
    }

    pub fn len(&self) -> usize {
        self.evaluations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluations.read().is_empty()
    }
}
