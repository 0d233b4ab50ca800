//! Metric status and the roll-up buckets used by meta-metrics.

use core::fmt;

/// The outcome of evaluating one metric in one run.
///
/// Ordered from best to worst measured outcome, followed by the two
/// "could not measure" states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Status {
    /// The value reached the ideal value for its direction.
    Perfect,
    /// The value meets the target.
    Green,
    /// The value misses the target but meets the low target.
    Yellow,
    /// The value misses the low target.
    Red,
    /// The value misses the low target but meets an accepted technical-debt target.
    Grey,
    /// A source is configured but had no usable value.
    Missing,
    /// No source is configured for the metric.
    MissingSource,
}

impl Status {
    /// Every status, in declaration order.
    pub const ALL: [Status; 7] = [
        Status::Perfect,
        Status::Green,
        Status::Yellow,
        Status::Red,
        Status::Grey,
        Status::Missing,
        Status::MissingSource,
    ];

    /// The persisted name, as written to the history file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Perfect => "perfect",
            Status::Green => "green",
            Status::Yellow => "yellow",
            Status::Red => "red",
            Status::Grey => "grey",
            Status::Missing => "missing",
            Status::MissingSource => "missing_source",
        }
    }

    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Status::Perfect => "PERF",
            Status::Green => "OK",
            Status::Yellow => "WARN",
            Status::Red => "CRIT",
            Status::Grey => "DEBT",
            Status::Missing => "MISS",
            Status::MissingSource => "NOSRC",
        }
    }

    /// The meta-metric bucket this status counts towards.
    pub fn bucket(&self) -> Bucket {
        match self {
            Status::Perfect | Status::Green => Bucket::Green,
            Status::Yellow => Bucket::Yellow,
            Status::Red => Bucket::Red,
            Status::Grey => Bucket::Grey,
            Status::Missing | Status::MissingSource => Bucket::Missing,
        }
    }

    /// Whether a value was actually measured.
    pub fn is_measured(&self) -> bool {
        !matches!(self, Status::Missing | Status::MissingSource)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roll-up group of statuses, one per meta-metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Bucket {
    /// Perfect and green metrics.
    Green,
    Red,
    Yellow,
    Grey,
    /// Missing and missing-source metrics.
    Missing,
}

impl Bucket {
    /// Every bucket, in the order meta-metrics are reported.
    pub const ALL: [Bucket; 5] = [
        Bucket::Green,
        Bucket::Red,
        Bucket::Yellow,
        Bucket::Grey,
        Bucket::Missing,
    ];

    /// Id of the meta-metric that reports this bucket's percentage.
    pub fn meta_metric_id(&self) -> &'static str {
        match self {
            Bucket::Green => "GreenMetaMetric",
            Bucket::Red => "RedMetaMetric",
            Bucket::Yellow => "YellowMetaMetric",
            Bucket::Grey => "GreyMetaMetric",
            Bucket::Missing => "MissingMetaMetric",
        }
    }

    /// Check whether a status falls in this bucket.
    pub fn contains(&self, status: Status) -> bool {
        status.bucket() == *self
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Bucket::Green => "green",
            Bucket::Red => "red",
            Bucket::Yellow => "yellow",
            Bucket::Grey => "grey",
            Bucket::Missing => "missing",
        };
        f.write_str(name)
    }
}

/// Ids of all meta-metrics, in bucket order.
pub fn meta_metric_ids() -> [&'static str; 5] {
    Bucket::ALL.map(|b| b.meta_metric_id())
}
