//! # qualitywatch
//!
//! Turns raw measurements from many quality tools into one colour-coded
//! status per metric, with a compact history for trends.
//!
//! The engine lives in [`qualitywatch_core`]; this crate adds configuration
//! loading and plain-text rendering for the command-line driver.
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌───────────────┐   ┌──────────────┐
//! │ MetricSource │──▶│ Fetcher  │──▶│ Status engine │──▶│ Meta-metrics │
//! │ (adapters)   │   │ (bounded)│   │ (targets)     │   │ (buckets)    │
//! └──────────────┘   └──────────┘   └───────┬───────┘   └──────┬───────┘
//!                                           │ previous status  │
//!                                           ▼                  ▼
//!                                   ┌──────────────────────────────────┐
//!                                   │ History (JSON Lines, append-only)│
//!                                   └──────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Evaluate every configured metric and append to the history
//! qualitywatch run --config qualitywatch.toml
//!
//! # Deduplicate and compact the history
//! qualitywatch clean --history history.jsonl --window 250
//!
//! # Show the recent values of a metric
//! qualitywatch trend --history history.jsonl --id violations
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use qualitywatch::QualityConfig;
//!
//! # tokio_test::block_on(async {
//! let config = QualityConfig::load("qualitywatch.toml".as_ref()).unwrap();
//! let runner = config.runner().unwrap();
//! let report = runner.run(chrono::Utc::now()).await.unwrap();
//! print!("{}", qualitywatch::report::render_run(&report));
//! # });
//! ```

pub mod config;
pub mod report;

pub use config::QualityConfig;
