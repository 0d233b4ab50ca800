//! Metric definitions: what is measured, where it comes from, and how its
//! value is judged.

use chrono::{DateTime, Utc};

use crate::target::format_value;
use crate::{ConfigurationError, Direction, Targets};

/// Where a metric's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBinding {
    /// Name of a registered metric source.
    pub source: String,
    /// Subject id passed to the source.
    pub subject: String,
}

impl SourceBinding {
    pub fn new(source: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            subject: subject.into(),
        }
    }
}

/// An ordinal scale for non-numeric metrics, such as a mood indicator.
///
/// Labels are listed from worst to best; thresholds are labels on the scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdinalScale {
    labels: Vec<String>,
    target: usize,
    low_target: usize,
}

impl OrdinalScale {
    /// Create a scale from labels ordered worst to best.
    pub fn new(
        metric: &str,
        labels: impl IntoIterator<Item = impl Into<String>>,
        target: &str,
        low_target: &str,
    ) -> Result<Self, ConfigurationError> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let position = |label: &str| {
            labels
                .iter()
                .position(|l| l == label)
                .ok_or_else(|| ConfigurationError::UnknownLabel {
                    metric: metric.to_string(),
                    label: label.to_string(),
                })
        };

        let target_rank = position(target)?;
        let low_rank = position(low_target)?;
        if target_rank < low_rank {
            return Err(ConfigurationError::InconsistentTargets {
                metric: metric.to_string(),
                target: target.to_string(),
                low_target: low_target.to_string(),
            });
        }

        Ok(Self {
            labels,
            target: target_rank,
            low_target: low_rank,
        })
    }

    /// Labels from worst to best.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Position of `label` on the scale, worst first.
    pub fn rank(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn target_rank(&self) -> usize {
        self.target
    }

    pub fn low_target_rank(&self) -> usize {
        self.low_target
    }

    pub fn target(&self) -> &str {
        &self.labels[self.target]
    }

    pub fn low_target(&self) -> &str {
        &self.labels[self.low_target]
    }
}

/// How a metric's value is judged.
#[derive(Debug, Clone, PartialEq)]
pub enum Scale {
    Numeric {
        direction: Direction,
        targets: Targets,
        /// Overrides the direction's ideal value for `perfect`.
        perfect_value: Option<f64>,
    },
    Ordinal(OrdinalScale),
}

/// One configured metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    id: String,
    name: String,
    unit: String,
    former_ids: Vec<String>,
    source: Option<SourceBinding>,
    scale: Scale,
    decimals: u32,
}

impl MetricDefinition {
    /// Create a builder for a metric with the given id.
    pub fn builder(id: impl Into<String>) -> MetricDefinitionBuilder {
        MetricDefinitionBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn source(&self) -> Option<&SourceBinding> {
        self.source.as_ref()
    }

    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    /// Current id followed by former ids, for reading history written
    /// before a rename.
    pub fn history_ids(&self) -> Vec<&str> {
        std::iter::once(self.id.as_str())
            .chain(self.former_ids.iter().map(String::as_str))
            .collect()
    }

    /// The value thresholds, rendered for people.
    ///
    /// Built from the same thresholds the status engine uses.
    pub fn norm(&self, now: DateTime<Utc>) -> String {
        match &self.scale {
            Scale::Numeric {
                direction,
                targets,
                ..
            } => {
                let unit = self.display_unit(direction);
                let d = self.decimals;
                let (good, bad) = if direction.lower_is_better() {
                    ("at most", "more than")
                } else {
                    ("at least", "less than")
                };
                let mut norm = format!(
                    "{}: {good} {}{unit} is green, {bad} {}{unit} is red.",
                    direction.describe(),
                    format_value(targets.target(), d),
                    format_value(targets.low_target(), d),
                );
                if let Some(debt) = targets.technical_debt_target() {
                    norm.push(' ');
                    norm.push_str(&debt.explanation_at(now, &unit));
                }
                norm
            }
            Scale::Ordinal(scale) => format!(
                "{} or better is green, worse than {} is red.",
                scale.target(),
                scale.low_target()
            ),
        }
    }

    fn display_unit(&self, direction: &Direction) -> String {
        match (direction, self.unit.as_str()) {
            (Direction::Percentage { .. }, "") => "%".to_string(),
            (_, "") => String::new(),
            (_, "%") => "%".to_string(),
            (_, unit) => format!(" {unit}"),
        }
    }
}

/// Builder for `MetricDefinition`.
#[derive(Debug)]
pub struct MetricDefinitionBuilder {
    id: String,
    name: Option<String>,
    unit: String,
    former_ids: Vec<String>,
    source: Option<SourceBinding>,
    direction: Direction,
    targets: Option<Targets>,
    perfect_value: Option<f64>,
    ordinal: Option<OrdinalScale>,
    decimals: u32,
}

impl MetricDefinitionBuilder {
    /// Create a new builder.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            unit: String::new(),
            former_ids: Vec::new(),
            source: None,
            direction: Direction::LowerIsBetter,
            targets: None,
            perfect_value: None,
            ordinal: None,
            decimals: 0,
        }
    }

    /// Set the display name (default: the id).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the unit shown in norm texts (e.g. "violations", "%").
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Add an id this metric was previously recorded under.
    pub fn former_id(mut self, id: impl Into<String>) -> Self {
        self.former_ids.push(id.into());
        self
    }

    /// Bind the metric to a source and subject.
    pub fn source(mut self, source: impl Into<String>, subject: impl Into<String>) -> Self {
        self.source = Some(SourceBinding::new(source, subject));
        self
    }

    /// Set the comparison direction (default: lower is better).
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Set the numeric thresholds.
    pub fn targets(mut self, targets: Targets) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Set the value that counts as perfect.
    pub fn perfect_value(mut self, value: f64) -> Self {
        self.perfect_value = Some(value);
        self
    }

    /// Judge the metric on an ordinal scale instead of numerically.
    pub fn ordinal(mut self, scale: OrdinalScale) -> Self {
        self.ordinal = Some(scale);
        self
    }

    /// Number of decimals shown in norm texts.
    pub fn decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    /// Validate and build the definition.
    pub fn build(self) -> Result<MetricDefinition, ConfigurationError> {
        if self.id.is_empty() || self.id == "date" {
            return Err(ConfigurationError::ReservedId(self.id));
        }

        let scale = match (self.ordinal, self.targets) {
            (Some(scale), _) => Scale::Ordinal(scale),
            (None, Some(targets)) => {
                targets.validate(&self.id, self.direction)?;
                Scale::Numeric {
                    direction: self.direction,
                    targets,
                    perfect_value: self.perfect_value,
                }
            }
            (None, None) => return Err(ConfigurationError::MissingTargets(self.id)),
        };

        Ok(MetricDefinition {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            unit: self.unit,
            former_ids: self.former_ids,
            source: self.source,
            scale,
            decimals: self.decimals,
        })
    }
}
