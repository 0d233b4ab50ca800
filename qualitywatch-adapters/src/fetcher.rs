//! Concurrent fetching of measurements for one run.
//!
//! The fetcher is the adapter boundary: every error or timeout a source
//! produces is logged here and turned into `Measurement::Unavailable`, so the
//! status engine only ever sees measurements.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use qualitywatch_types::Measurement;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::{AdapterError, CircuitBreaker, MetricSource};

/// Default number of fetches in flight at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Default time allowed for a single fetch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifies one fetch: which source, which subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchKey {
    pub source: String,
    pub subject: String,
}

impl FetchKey {
    pub fn new(source: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            subject: subject.into(),
        }
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.subject)
    }
}

/// A request to fetch one subject from one source.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub source: Arc<dyn MetricSource>,
    pub subject: String,
}

impl FetchRequest {
    pub fn new(source: Arc<dyn MetricSource>, subject: impl Into<String>) -> Self {
        Self {
            source,
            subject: subject.into(),
        }
    }

    /// The memo key for this request.
    pub fn key(&self) -> FetchKey {
        FetchKey::new(self.source.name(), self.subject.clone())
    }
}

type Memo = Mutex<HashMap<FetchKey, Arc<OnceCell<Measurement>>>>;

/// Fetches measurements with bounded concurrency, a per-call timeout,
/// per-run memoization and a per-host circuit breaker.
///
/// Cloning is cheap; clones share the worker pool, memo and breaker.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use qualitywatch_adapters::{FetchRequest, Fetcher, MetricSource, StaticSource};
/// use qualitywatch_types::Measurement;
///
/// # tokio_test::block_on(async {
/// let source: Arc<dyn MetricSource> = Arc::new(
///     StaticSource::builder("manual").value("team-a", 3.0).build(),
/// );
///
/// let fetcher = Fetcher::builder().max_concurrent(4).build();
/// let results = fetcher
///     .fetch_all(vec![FetchRequest::new(source, "team-a")])
///     .await;
///
/// assert_eq!(results.values().next(), Some(&Measurement::Number(3.0)));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Fetcher {
    permits: Arc<Semaphore>,
    timeout: Duration,
    breaker: Arc<CircuitBreaker>,
    memo: Arc<Memo>,
}

impl Fetcher {
    /// Create a new builder for configuring the fetcher.
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::default()
    }

    /// The circuit breaker shared by this fetcher.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Forget memoized results and close every circuit, ready for a new run.
    pub fn begin_run(&self) {
        self.memo.lock().clear();
        self.breaker.reset();
    }

    /// Fetch every request and wait until all have completed or timed out.
    ///
    /// The result holds exactly one measurement per distinct request key.
    pub async fn fetch_all(
        &self,
        requests: impl IntoIterator<Item = FetchRequest>,
    ) -> HashMap<FetchKey, Measurement> {
        let mut results = HashMap::new();
        let mut tasks = JoinSet::new();

        for request in requests {
            let key = request.key();
            if results.contains_key(&key) {
                continue;
            }
            results.insert(key.clone(), Measurement::Unavailable);

            let fetcher = self.clone();
            tasks.spawn(async move {
                let value = fetcher.fetch(&request.source, &request.subject).await;
                (key, value)
            });
        }

        debug!(requests = results.len(), "fetching measurements");

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, value)) => {
                    results.insert(key, value);
                }
                Err(e) => warn!(error = %e, "fetch task failed"),
            }
        }

        results
    }

    /// Fetch one subject, sharing the result with every other caller asking
    /// for the same source and subject during this run.
    pub async fn fetch(&self, source: &Arc<dyn MetricSource>, subject: &str) -> Measurement {
        let cell = self.memo_cell(FetchKey::new(source.name(), subject));
        cell.get_or_init(|| self.fetch_uncached(source.as_ref(), subject))
            .await
            .clone()
    }

    fn memo_cell(&self, key: FetchKey) -> Arc<OnceCell<Measurement>> {
        self.memo
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn fetch_uncached(&self, source: &dyn MetricSource, subject: &str) -> Measurement {
        let host = source.host().map(str::to_string);

        if let Some(host) = host.as_deref() {
            if self.breaker.is_open(host) {
                debug!(source = source.name(), subject, host, "skipping fetch, circuit open");
                return Measurement::Unavailable;
            }
        }

        let Ok(_permit) = self.permits.acquire().await else {
            return Measurement::Unavailable;
        };

        // The host may have tripped while this fetch waited for a permit.
        if let Some(host) = host.as_deref() {
            if self.breaker.is_open(host) {
                return Measurement::Unavailable;
            }
        }

        let outcome = match tokio::time::timeout(self.timeout, source.value(subject)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout),
        };

        match outcome {
            Ok(value) => value,
            Err(e) => {
                if e.is_timeout() {
                    if let Some(host) = host.as_deref() {
                        self.breaker.record_timeout(host);
                    }
                }
                warn!(source = source.name(), subject, error = %e, "fetch failed");
                Measurement::Unavailable
            }
        }
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for `Fetcher`.
#[derive(Debug, Default)]
pub struct FetcherBuilder {
    max_concurrent: Option<usize>,
    timeout: Option<Duration>,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl FetcherBuilder {
    /// Set the number of fetches allowed in flight at once (default: 8).
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = Some(max.max(1));
        self
    }

    /// Set the time allowed per fetch (default: 30 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a specific circuit breaker, e.g. one with a cool-down.
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Build the fetcher.
    pub fn build(self) -> Fetcher {
        Fetcher {
            permits: Arc::new(Semaphore::new(
                self.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT),
            )),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            breaker: self.breaker.unwrap_or_default(),
            memo: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that counts calls and can be made slow or failing.
    #[derive(Debug)]
    struct ScriptedSource {
        name: &'static str,
        host: Option<&'static str>,
        delay: Duration,
        fail: bool,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                host: None,
                delay: Duration::ZERO,
                fail: false,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn host(mut self, host: &'static str) -> Self {
            self.host = Some(host);
            self
        }

        fn delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl MetricSource for ScriptedSource {
        fn name(&self) -> &str {
            self.name
        }

        fn host(&self) -> Option<&str> {
            self.host
        }

        async fn value(&self, subject: &str) -> Result<Measurement, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(AdapterError::Parse(format!("bad payload for {subject}")));
            }
            Ok(Measurement::Number(subject.len() as f64))
        }
    }

    #[tokio::test]
    async fn same_request_is_fetched_once() {
        let source = Arc::new(ScriptedSource::new("jira"));
        let dyn_source: Arc<dyn MetricSource> = source.clone();
        let fetcher = Fetcher::default();

        let results = fetcher
            .fetch_all(vec![
                FetchRequest::new(dyn_source.clone(), "abc"),
                FetchRequest::new(dyn_source.clone(), "abc"),
                FetchRequest::new(dyn_source.clone(), "de"),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[&FetchKey::new("jira", "abc")], Measurement::Number(3.0));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        // A later single fetch in the same run is served from the memo.
        fetcher.fetch(&dyn_source, "abc").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn begin_run_forgets_memoized_values() {
        let source = Arc::new(ScriptedSource::new("jira"));
        let dyn_source: Arc<dyn MetricSource> = source.clone();
        let fetcher = Fetcher::default();

        fetcher.fetch(&dyn_source, "abc").await;
        fetcher.begin_run();
        fetcher.fetch(&dyn_source, "abc").await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_become_unavailable() {
        let source: Arc<dyn MetricSource> = Arc::new(ScriptedSource::new("sonar").failing());
        let fetcher = Fetcher::default();

        let value = fetcher.fetch(&source, "project").await;
        assert_eq!(value, Measurement::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_opens_circuit_for_host() {
        let slow = Arc::new(
            ScriptedSource::new("sonar")
                .host("sonar.local")
                .delay(Duration::from_secs(60)),
        );
        let slow_dyn: Arc<dyn MetricSource> = slow.clone();
        let fetcher = Fetcher::builder()
            .timeout(Duration::from_secs(5))
            .max_concurrent(1)
            .build();

        let results = fetcher
            .fetch_all(vec![
                FetchRequest::new(slow_dyn.clone(), "a"),
                FetchRequest::new(slow_dyn.clone(), "b"),
                FetchRequest::new(slow_dyn.clone(), "c"),
            ])
            .await;

        assert!(results.values().all(|m| *m == Measurement::Unavailable));
        // Only the first call reached the host; the rest failed fast.
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.breaker().open_hosts(), vec!["sonar.local".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let source = Arc::new(ScriptedSource::new("jenkins").delay(Duration::from_millis(10)));
        let dyn_source: Arc<dyn MetricSource> = source.clone();
        let fetcher = Fetcher::builder().max_concurrent(2).build();

        let requests = (0..10).map(|i| FetchRequest::new(dyn_source.clone(), format!("job-{i}")));
        let results = fetcher.fetch_all(requests).await;

        assert_eq!(results.len(), 10);
        assert_eq!(source.calls.load(Ordering::SeqCst), 10);
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn hostless_sources_are_never_short_circuited() {
        let fetcher = Fetcher::default();
        let source: Arc<dyn MetricSource> =
            Arc::new(StaticSource::builder("manual").value("x", 1.0).build());

        let value = fetcher.fetch(&source, "x").await;
        assert_eq!(value, Measurement::Number(1.0));
    }
}
