//! Per-host circuit breaker for fetches.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// Remembers hosts that recently timed out so the rest of a run fails fast
/// instead of waiting on a dead host once per metric.
///
/// A tripped host stays open until [`reset`](Self::reset) is called (the
/// [`Fetcher`](crate::Fetcher) does this at the start of every run) or, if a
/// cool-down is configured, until the cool-down has elapsed.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    tripped: RwLock<HashMap<String, Instant>>,
    cool_down: Option<Duration>,
}

impl CircuitBreaker {
    /// Create a breaker that stays open until reset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a breaker that retries a host after `cool_down`.
    pub fn with_cool_down(cool_down: Duration) -> Self {
        Self {
            tripped: RwLock::new(HashMap::new()),
            cool_down: Some(cool_down),
        }
    }

    /// Check whether calls to `host` should be suppressed.
    pub fn is_open(&self, host: &str) -> bool {
        let tripped_at = match self.tripped.read().get(host) {
            Some(at) => *at,
            None => return false,
        };

        match self.cool_down {
            Some(cool_down) if tripped_at.elapsed() >= cool_down => {
                self.tripped.write().remove(host);
                debug!(host, "circuit cool-down elapsed, retrying host");
                false
            }
            _ => true,
        }
    }

    /// Record that a call to `host` timed out.
    pub fn record_timeout(&self, host: &str) {
        let mut tripped = self.tripped.write();
        if !tripped.contains_key(host) {
            info!(host, "host timed out, suppressing further calls");
        }
        tripped.insert(host.to_string(), Instant::now());
    }

    /// Close the circuit for every host.
    pub fn reset(&self) {
        self.tripped.write().clear();
    }

    /// Hosts currently tripped, sorted.
    pub fn open_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.tripped.read().keys().cloned().collect();
        hosts.sort();
        hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_host_is_closed() {
        let breaker = CircuitBreaker::new();
        assert!(!breaker.is_open("sonar.local"));
        assert!(breaker.open_hosts().is_empty());
    }

    #[tokio::test]
    async fn timeout_opens_until_reset() {
        let breaker = CircuitBreaker::new();
        breaker.record_timeout("sonar.local");

        assert!(breaker.is_open("sonar.local"));
        assert!(!breaker.is_open("jenkins.local"));
        assert_eq!(breaker.open_hosts(), vec!["sonar.local".to_string()]);

        breaker.reset();
        assert!(!breaker.is_open("sonar.local"));
    }

    #[tokio::test(start_paused = true)]
    async fn cool_down_closes_the_circuit() {
        let breaker = CircuitBreaker::with_cool_down(Duration::from_secs(60));
        breaker.record_timeout("sonar.local");

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(breaker.is_open("sonar.local"));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!breaker.is_open("sonar.local"));
        assert!(breaker.open_hosts().is_empty());
    }
}
