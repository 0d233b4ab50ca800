//! # qualitywatch-core
//!
//! The evaluation and history engine of qualitywatch.
//!
//! - [`Targets`] and [`TechnicalDebtTarget`]: the thresholds a metric is
//!   judged against, including debt allowances that shrink over time
//! - [`evaluate`]: turns one measurement into one [`Status`]
//! - [`HistoryStore`]: the append-only JSON Lines history with bounded
//!   recent reads, deduplication and compaction
//! - [`MetaMetrics`]: percentage of metrics per status bucket
//! - [`Runner`]: one complete run, from concurrent fetch to history append
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use qualitywatch_core::{evaluate, Direction, MetricDefinition, Targets};
//! use qualitywatch_types::{Measurement, Status};
//!
//! let violations = MetricDefinition::builder("violations")
//!     .source("sonar", "my-project")
//!     .direction(Direction::LowerIsBetter)
//!     .targets(Targets::new(0.0, 2.0))
//!     .build()
//!     .unwrap();
//!
//! let eval = evaluate(&violations, Some(&Measurement::Number(1.0)), Utc::now());
//! assert_eq!(eval.status, Status::Yellow);
//!
//! let eval = evaluate(&violations, Some(&Measurement::Unavailable), Utc::now());
//! assert_eq!(eval.status, Status::Missing);
//! ```

mod cache;
mod direction;
mod error;
pub mod history;
pub mod meta;
mod metric;
mod run;
mod status;
mod target;

pub use cache::RunCache;
pub use direction::{Direction, ZeroOverZero};
pub use error::{ConfigurationError, HistoryError, LinePosition};
pub use history::{CleanReport, CorruptLinePolicy, HistoryStore, TrendPoint, DEFAULT_WINDOW};
pub use meta::{BucketCounts, MetaEvaluation, MetaMetrics};
pub use metric::{MetricDefinition, MetricDefinitionBuilder, OrdinalScale, Scale, SourceBinding};
pub use run::{MetricResult, RunReport, Runner, RunnerBuilder};
pub use status::{evaluate, Evaluation};
pub use target::{DynamicTechnicalDebtTarget, TechnicalDebtTarget, Targets};

// Re-export types for convenience
pub use qualitywatch_types::{Bucket, HistoryRecord, Measurement, RecordValue, Status};
