//! # qualitywatch-adapters
//!
//! The boundary between external quality tools and the status engine.
//!
//! - [`MetricSource`]: the narrow contract a tool adapter implements
//!   ("give me one value for this subject")
//! - [`StaticSource`]: fixed values, for manually tracked metrics and tests
//! - [`http::HttpJsonSource`] (`http` feature): one JSON value per subject
//!   from an HTTP endpoint
//! - [`Fetcher`]: runs a whole run's fetches concurrently with a bounded
//!   worker pool, per-call timeouts, memoization and a per-host
//!   [`CircuitBreaker`], turning every failure into
//!   `Measurement::Unavailable`
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use qualitywatch_adapters::{FetchKey, FetchRequest, Fetcher, MetricSource, StaticSource};
//! use qualitywatch_types::Measurement;
//!
//! # tokio_test::block_on(async {
//! let manual: Arc<dyn MetricSource> = Arc::new(
//!     StaticSource::builder("manual")
//!         .value("team-a", Measurement::label(":-)"))
//!         .build(),
//! );
//!
//! let fetcher = Fetcher::default();
//! let results = fetcher
//!     .fetch_all(vec![
//!         FetchRequest::new(manual.clone(), "team-a"),
//!         FetchRequest::new(manual, "team-b"),
//!     ])
//!     .await;
//!
//! assert_eq!(results[&FetchKey::new("manual", "team-a")], Measurement::label(":-)"));
//! assert_eq!(results[&FetchKey::new("manual", "team-b")], Measurement::Unavailable);
//! # });
//! ```

mod breaker;
pub mod error;
mod fetcher;
mod source;
mod static_source;

#[cfg(feature = "http")]
pub mod http;

pub use breaker::CircuitBreaker;
pub use error::AdapterError;
pub use fetcher::{
    FetchKey, FetchRequest, Fetcher, FetcherBuilder, DEFAULT_MAX_CONCURRENT, DEFAULT_TIMEOUT,
};
pub use source::{DetailRow, MetricSource};
pub use static_source::{StaticSource, StaticSourceBuilder};

// Re-export types for convenience
pub use qualitywatch_types::Measurement;
