//! # qualitywatch-types
//!
//! Core types for quality metric tracking. This crate defines the values that
//! flow between metric sources, the status engine and the history file:
//!
//! - [`Status`] and [`Bucket`]: the colour-coded outcome of one metric and the
//!   roll-up groups used by meta-metrics
//! - [`Measurement`]: what a source reports for one subject
//! - [`HistoryRecord`]: one run as persisted in the history file
//!
//! ## Features
//!
//! - `serde`: JSON serialization of statuses and history records. The history
//!   store in `qualitywatch-core` enables this.
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use qualitywatch_types::{HistoryRecord, RecordValue, Status};
//!
//! let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
//! let record = HistoryRecord::builder(date)
//!     .tracked("coverage", RecordValue::Number(81.0), Status::Green, date)
//!     .bare("GreenMetaMetric", RecordValue::Number(100.0))
//!     .build();
//!
//! assert_eq!(record.len(), 2);
//! assert_eq!(record.get("coverage").and_then(|e| e.status()), Some(Status::Green));
//! ```

mod measurement;
mod record;
mod status;

pub use measurement::*;
pub use record::*;
pub use status::*;
