//! Raw measurements reported by metric sources.

use chrono::{DateTime, Utc};

/// Raw value that legacy sources use to signal "could not measure".
pub const UNMEASURABLE: f64 = -1.0;

/// What a metric source reports for one subject.
///
/// Sources signal ordinary absence of data with [`Measurement::Unavailable`]
/// rather than with an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// A plain number (count, duration, size, ...).
    Number(f64),

    /// A fraction, evaluated as a percentage.
    ///
    /// Kept unreduced so the evaluating metric can decide what `0/0` means.
    Ratio { numerator: f64, denominator: f64 },

    /// A point in time, evaluated as its age in days.
    Date(DateTime<Utc>),

    /// A label on an ordinal scale (e.g. a mood indicator).
    Label(String),

    /// The source had no usable value.
    Unavailable,
}

impl Measurement {
    /// Normalise a raw number, mapping the legacy sentinel, NaN and the
    /// infinities to [`Measurement::Unavailable`].
    pub fn from_raw(value: f64) -> Self {
        if !value.is_finite() || value == UNMEASURABLE {
            Measurement::Unavailable
        } else {
            Measurement::Number(value)
        }
    }

    /// Create a ratio measurement.
    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        Measurement::Ratio {
            numerator,
            denominator,
        }
    }

    /// Create a label measurement.
    pub fn label(label: impl Into<String>) -> Self {
        Measurement::Label(label.into())
    }

    /// Check whether the source produced a value.
    pub fn is_available(&self) -> bool {
        !matches!(self, Measurement::Unavailable)
    }

    /// The plain number, if this is a [`Measurement::Number`].
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Measurement::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Age in whole days of a date measurement at `now`.
    ///
    /// Dates in the future count as zero days old.
    pub fn age_in_days(&self, now: DateTime<Utc>) -> Option<f64> {
        match self {
            Measurement::Date(date) => Some((now - *date).num_days().max(0) as f64),
            _ => None,
        }
    }
}

impl From<f64> for Measurement {
    fn from(value: f64) -> Self {
        Measurement::from_raw(value)
    }
}

impl From<u64> for Measurement {
    fn from(value: u64) -> Self {
        Measurement::Number(value as f64)
    }
}

impl From<DateTime<Utc>> for Measurement {
    fn from(date: DateTime<Utc>) -> Self {
        Measurement::Date(date)
    }
}

impl<T: Into<Measurement>> From<Option<T>> for Measurement {
    fn from(value: Option<T>) -> Self {
        value.map_or(Measurement::Unavailable, Into::into)
    }
}
