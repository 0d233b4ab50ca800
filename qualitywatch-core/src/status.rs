//! Status engine: turns a fetched measurement into a status.
//!
//! Evaluation is a pure function of the definition, the measurement and the
//! evaluation time. Precedence, first match wins:
//!
//! 1. no source bound: `missing_source`
//! 2. nothing to compare: `missing`
//! 3. meets the target: `perfect` at the ideal value, else `green`
//! 4. meets the low target: `yellow`
//! 5. meets an accepted technical-debt target: `grey`, else `red`

use chrono::{DateTime, Utc};
use qualitywatch_types::{Measurement, RecordValue, Status};

use crate::metric::{MetricDefinition, OrdinalScale, Scale};
use crate::{Direction, Targets};

/// The outcome of evaluating one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// The value as it is persisted in history.
    pub value: RecordValue,
    pub status: Status,
}

impl Evaluation {
    fn unmeasured(status: Status) -> Self {
        Self {
            value: RecordValue::unavailable(),
            status,
        }
    }
}

/// Evaluate a metric.
///
/// `fetched` is `None` when the metric has no source bound.
pub fn evaluate(
    definition: &MetricDefinition,
    fetched: Option<&Measurement>,
    now: DateTime<Utc>,
) -> Evaluation {
    let Some(measurement) = fetched else {
        return Evaluation::unmeasured(Status::MissingSource);
    };

    // Sources that hand back the legacy sentinel as a plain number.
    let measurement = match measurement {
        Measurement::Number(n) => Measurement::from_raw(*n),
        other => other.clone(),
    };

    match definition.scale() {
        Scale::Numeric {
            direction,
            targets,
            perfect_value,
        } => match direction.resolve(&measurement, now) {
            Some(value) => Evaluation {
                value: RecordValue::Number(value),
                status: numeric_status(value, *direction, targets, *perfect_value, now),
            },
            None => Evaluation::unmeasured(Status::Missing),
        },
        Scale::Ordinal(scale) => match &measurement {
            Measurement::Label(label) => match ordinal_status(scale, label) {
                Some(status) => Evaluation {
                    value: RecordValue::Text(label.clone()),
                    status,
                },
                None => Evaluation::unmeasured(Status::Missing),
            },
            _ => Evaluation::unmeasured(Status::Missing),
        },
    }
}

fn numeric_status(
    value: f64,
    direction: Direction,
    targets: &Targets,
    perfect_value: Option<f64>,
    now: DateTime<Utc>,
) -> Status {
    if direction.at_least_as_good(value, targets.target()) {
        if direction.is_perfect(value, perfect_value) {
            Status::Perfect
        } else {
            Status::Green
        }
    } else if direction.at_least_as_good(value, targets.low_target()) {
        Status::Yellow
    } else {
        let accepted = targets
            .technical_debt_target()
            .is_some_and(|debt| direction.at_least_as_good(value, debt.value_at(now)));
        if accepted {
            Status::Grey
        } else {
            Status::Red
        }
    }
}

/// The best label on the scale counts as perfect.
fn ordinal_status(scale: &OrdinalScale, label: &str) -> Option<Status> {
    let rank = scale.rank(label)?;
    let status = if rank >= scale.target_rank() {
        if rank + 1 == scale.labels().len() {
            Status::Perfect
        } else {
            Status::Green
        }
    } else if rank >= scale.low_target_rank() {
        Status::Yellow
    } else {
        Status::Red
    };
    Some(status)
}
