//! Which way is "better" for a metric.

use chrono::{DateTime, Utc};
use qualitywatch_types::Measurement;

/// What a percentage metric reports when its fraction is `0/0`.
///
/// This moves the metric across the perfect/red boundary, so it is chosen per
/// metric rather than globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroOverZero {
    /// Treat `0/0` as 0%.
    #[default]
    Zero,
    /// Treat `0/0` as 100%.
    Hundred,
}

impl ZeroOverZero {
    fn percentage(&self) -> f64 {
        match self {
            ZeroOverZero::Zero => 0.0,
            ZeroOverZero::Hundred => 100.0,
        }
    }
}

/// Comparison strategy for a numeric metric, chosen once per definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
    /// A percentage in `[0, 100]`, computed from a ratio where needed.
    Percentage {
        lower_is_better: bool,
        zero_over_zero: ZeroOverZero,
    },
}

impl Direction {
    /// A higher-is-better percentage with `0/0` treated as `zero_over_zero`.
    pub fn higher_percentage(zero_over_zero: ZeroOverZero) -> Self {
        Direction::Percentage {
            lower_is_better: false,
            zero_over_zero,
        }
    }

    /// A lower-is-better percentage with `0/0` treated as `zero_over_zero`.
    pub fn lower_percentage(zero_over_zero: ZeroOverZero) -> Self {
        Direction::Percentage {
            lower_is_better: true,
            zero_over_zero,
        }
    }

    pub fn lower_is_better(&self) -> bool {
        match self {
            Direction::HigherIsBetter => false,
            Direction::LowerIsBetter => true,
            Direction::Percentage {
                lower_is_better, ..
            } => *lower_is_better,
        }
    }

    /// Check whether `value` is at least as good as `threshold`.
    pub fn at_least_as_good(&self, value: f64, threshold: f64) -> bool {
        if self.lower_is_better() {
            value <= threshold
        } else {
            value >= threshold
        }
    }

    /// The best value the metric can take, if it has one.
    ///
    /// Plain higher-is-better metrics are unbounded and have none.
    pub fn ideal_value(&self) -> Option<f64> {
        match self {
            Direction::HigherIsBetter => None,
            Direction::LowerIsBetter => Some(0.0),
            Direction::Percentage {
                lower_is_better: true,
                ..
            } => Some(0.0),
            Direction::Percentage {
                lower_is_better: false,
                ..
            } => Some(100.0),
        }
    }

    /// Check whether `value` reaches `ideal` (or the direction's own ideal).
    pub fn is_perfect(&self, value: f64, ideal: Option<f64>) -> bool {
        ideal
            .or_else(|| self.ideal_value())
            .is_some_and(|ideal| self.at_least_as_good(value, ideal))
    }

    /// Turn a measurement into the number this metric compares.
    ///
    /// Returns `None` when there is nothing to compare: unavailable values,
    /// labels, non-finite results, and fractions with a zero denominator
    /// (other than a percentage's `0/0`).
    pub fn resolve(&self, measurement: &Measurement, now: DateTime<Utc>) -> Option<f64> {
        let value = match measurement {
            Measurement::Number(n) => Some(*n),
            Measurement::Ratio {
                numerator,
                denominator,
            } => {
                if *denominator != 0.0 {
                    Some(100.0 * numerator / denominator)
                } else if *numerator == 0.0 {
                    match self {
                        Direction::Percentage { zero_over_zero, .. } => {
                            Some(zero_over_zero.percentage())
                        }
                        _ => None,
                    }
                } else {
                    None
                }
            }
            Measurement::Date(_) => measurement.age_in_days(now),
            Measurement::Label(_) | Measurement::Unavailable => None,
        };
        // JSON has no encoding for infinities.
        value.filter(|v| v.is_finite())
    }

    /// Short phrase for norm texts.
    pub(crate) fn describe(&self) -> &'static str {
        if self.lower_is_better() {
            "Lower is better"
        } else {
            "Higher is better"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn comparison_flips_with_direction() {
        assert!(Direction::LowerIsBetter.at_least_as_good(1.0, 2.0));
        assert!(Direction::LowerIsBetter.at_least_as_good(2.0, 2.0));
        assert!(!Direction::LowerIsBetter.at_least_as_good(3.0, 2.0));

        assert!(Direction::HigherIsBetter.at_least_as_good(3.0, 2.0));
        assert!(!Direction::HigherIsBetter.at_least_as_good(1.0, 2.0));
    }

    #[test]
    fn perfect_needs_an_ideal() {
        assert!(Direction::LowerIsBetter.is_perfect(0.0, None));
        assert!(!Direction::LowerIsBetter.is_perfect(1.0, None));
        assert!(!Direction::HigherIsBetter.is_perfect(1_000_000.0, None));
        assert!(Direction::HigherIsBetter.is_perfect(10.0, Some(10.0)));
        assert!(Direction::higher_percentage(ZeroOverZero::Zero).is_perfect(100.0, None));
    }

    #[test]
    fn ratio_resolves_to_percentage() {
        let d = Direction::higher_percentage(ZeroOverZero::Zero);
        assert_eq!(d.resolve(&Measurement::ratio(1.0, 4.0), now()), Some(25.0));
    }

    #[test]
    fn zero_over_zero_follows_policy() {
        let m = Measurement::ratio(0.0, 0.0);
        assert_eq!(
            Direction::higher_percentage(ZeroOverZero::Zero).resolve(&m, now()),
            Some(0.0)
        );
        assert_eq!(
            Direction::higher_percentage(ZeroOverZero::Hundred).resolve(&m, now()),
            Some(100.0)
        );
        assert_eq!(Direction::LowerIsBetter.resolve(&m, now()), None);
    }

    #[test]
    fn nonzero_over_zero_is_unresolvable() {
        let d = Direction::lower_percentage(ZeroOverZero::Hundred);
        assert_eq!(d.resolve(&Measurement::ratio(3.0, 0.0), now()), None);
    }

    #[test]
    fn labels_and_unavailable_do_not_resolve() {
        let d = Direction::LowerIsBetter;
        assert_eq!(d.resolve(&Measurement::label(":-("), now()), None);
        assert_eq!(d.resolve(&Measurement::Unavailable, now()), None);
    }
}
