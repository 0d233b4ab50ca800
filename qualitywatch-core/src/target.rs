//! Target model: the thresholds a metric's value is judged against.
//!
//! A metric has a `target` (good enough) and a `low_target` (still
//! acceptable). Optionally a technical-debt target records a knowingly
//! accepted, relaxed threshold: values that miss the low target but meet the
//! debt target are grey instead of red. A dynamic debt target shrinks the
//! allowance linearly over time.

use chrono::{DateTime, Utc};

use crate::{ConfigurationError, Direction};

/// Round `value` to `decimals` places, half away from zero.
pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Format `value` with exactly `decimals` places.
pub(crate) fn format_value(value: f64, decimals: u32) -> String {
    format!("{:.*}", decimals as usize, value)
}

/// A debt target that moves linearly from one value to another over a date
/// range, and stays at the end value afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicTechnicalDebtTarget {
    initial_value: f64,
    initial_date: DateTime<Utc>,
    end_value: f64,
    end_date: DateTime<Utc>,
    decimals: u32,
}

impl DynamicTechnicalDebtTarget {
    /// Create a dynamic target.
    ///
    /// Fails if `end_date` is not after `initial_date`.
    pub fn new(
        initial_value: f64,
        initial_date: DateTime<Utc>,
        end_value: f64,
        end_date: DateTime<Utc>,
    ) -> Result<Self, ConfigurationError> {
        if end_date <= initial_date {
            return Err(ConfigurationError::InvalidDebtInterval {
                start: initial_date,
                end: end_date,
            });
        }
        Ok(Self {
            initial_value,
            initial_date,
            end_value,
            end_date,
            decimals: 0,
        })
    }

    /// Round interpolated values to `decimals` places (default: whole numbers).
    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    /// How far through the interval `now` is, clamped to `[0, 1]`.
    fn progress(&self, now: DateTime<Utc>) -> f64 {
        let span = (self.end_date - self.initial_date).num_milliseconds();
        if span <= 0 {
            return if now >= self.end_date { 1.0 } else { 0.0 };
        }
        let elapsed = (now - self.initial_date).num_milliseconds();
        (elapsed as f64 / span as f64).clamp(0.0, 1.0)
    }

    /// The accepted value at `now`.
    pub fn value_at(&self, now: DateTime<Utc>) -> f64 {
        let raw = self.initial_value + (self.end_value - self.initial_value) * self.progress(now);
        round_to(raw, self.decimals)
    }

    /// Explanation of the target at `now`, rendered from [`value_at`](Self::value_at).
    pub fn explanation_at(&self, now: DateTime<Utc>, unit: &str) -> String {
        let d = self.decimals;
        format!(
            "The accepted technical debt is {}{unit}, moving from {}{unit} on {} to {}{unit} on {}.",
            format_value(self.value_at(now), d),
            format_value(round_to(self.initial_value, d), d),
            self.initial_date.format("%Y-%m-%d"),
            format_value(round_to(self.end_value, d), d),
            self.end_date.format("%Y-%m-%d"),
        )
    }
}

/// A knowingly accepted, relaxed threshold.
#[derive(Debug, Clone, PartialEq)]
pub enum TechnicalDebtTarget {
    /// A fixed override with its justification.
    Static { value: f64, explanation: String },
    /// A time-interpolated override.
    Dynamic(DynamicTechnicalDebtTarget),
}

impl TechnicalDebtTarget {
    /// Create a static debt target.
    pub fn fixed(value: f64, explanation: impl Into<String>) -> Self {
        TechnicalDebtTarget::Static {
            value,
            explanation: explanation.into(),
        }
    }

    /// The accepted value at `now`.
    pub fn value_at(&self, now: DateTime<Utc>) -> f64 {
        match self {
            TechnicalDebtTarget::Static { value, .. } => *value,
            TechnicalDebtTarget::Dynamic(dynamic) => dynamic.value_at(now),
        }
    }

    /// Human-readable explanation at `now`.
    pub fn explanation_at(&self, now: DateTime<Utc>, unit: &str) -> String {
        match self {
            TechnicalDebtTarget::Static { value, explanation } => {
                format!("The accepted technical debt is {value}{unit}: {explanation}")
            }
            TechnicalDebtTarget::Dynamic(dynamic) => dynamic.explanation_at(now, unit),
        }
    }
}

impl From<DynamicTechnicalDebtTarget> for TechnicalDebtTarget {
    fn from(dynamic: DynamicTechnicalDebtTarget) -> Self {
        TechnicalDebtTarget::Dynamic(dynamic)
    }
}

/// Thresholds for a numeric metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Targets {
    target: f64,
    low_target: f64,
    technical_debt: Option<TechnicalDebtTarget>,
}

impl Targets {
    /// Create thresholds without a debt target.
    pub fn new(target: f64, low_target: f64) -> Self {
        Self {
            target,
            low_target,
            technical_debt: None,
        }
    }

    /// Attach a technical-debt target.
    pub fn with_technical_debt(mut self, debt: impl Into<TechnicalDebtTarget>) -> Self {
        self.technical_debt = Some(debt.into());
        self
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn low_target(&self) -> f64 {
        self.low_target
    }

    pub fn technical_debt_target(&self) -> Option<&TechnicalDebtTarget> {
        self.technical_debt.as_ref()
    }

    /// Check that the target is at least as good as the low target.
    pub fn validate(&self, metric: &str, direction: Direction) -> Result<(), ConfigurationError> {
        if direction.at_least_as_good(self.target, self.low_target) {
            Ok(())
        } else {
            Err(ConfigurationError::InconsistentTargets {
                metric: metric.to_string(),
                target: self.target.to_string(),
                low_target: self.low_target.to_string(),
            })
        }
    }
}
