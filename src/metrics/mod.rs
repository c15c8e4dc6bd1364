//! Metrics collection module
//!
//! Tracks provider call counts, outcomes and response times.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Number of response times kept per provider
const RESPONSE_WINDOW: usize = 100;

#[derive(Debug, Default)]
struct ProviderCounters {
    calls: u64,
    successes: u64,
    errors: u64,
    timeouts: u64,
    response_times: Vec<u64>,
}

/// Per-provider metrics shared by every aggregator snapshot
#[derive(Debug, Default)]
pub struct ProviderMetrics {
    total_searches: AtomicU64,
    providers: Mutex<HashMap<String, ProviderCounters>>,
}

impl ProviderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> MutexGuard<'_, HashMap<String, ProviderCounters>> {
        self.providers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Increment aggregate search count
    pub fn inc_search(&self) {
        self.total_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_searches(&self) -> u64 {
        self.total_searches.load(Ordering::Relaxed)
    }

    /// Record that a provider was invoked
    pub fn record_call(&self, provider: &str) {
        self.counters().entry(provider.to_string()).or_default().calls += 1;
    }

    /// Record a settled provider call and how long it took
    pub fn record_outcome(&self, provider: &str, elapsed: Duration, success: bool) {
        let mut counters = self.counters();
        let entry = counters.entry(provider.to_string()).or_default();

        if success {
            entry.successes += 1;
        } else {
            entry.errors += 1;
        }

        if entry.response_times.len() >= RESPONSE_WINDOW {
            entry.response_times.remove(0);
        }
        entry.response_times.push(elapsed.as_millis() as u64);
    }

    /// Record a provider call abandoned by the aggregator's timeout
    pub fn record_timeout(&self, provider: &str) {
        let mut counters = self.counters();
        let entry = counters.entry(provider.to_string()).or_default();
        entry.timeouts += 1;
        entry.errors += 1;
    }

    /// Number of times a provider was invoked
    pub fn calls(&self, provider: &str) -> u64 {
        self.counters().get(provider).map_or(0, |c| c.calls)
    }

    /// Snapshot of every provider seen so far
    pub fn snapshot(&self) -> BTreeMap<String, ProviderStats> {
        self.counters()
            .iter()
            .map(|(id, c)| {
                let settled = c.successes + c.errors;
                let avg_response_time = if c.response_times.is_empty() {
                    None
                } else {
                    Some(c.response_times.iter().sum::<u64>() / c.response_times.len() as u64)
                };
                let reliability = if settled == 0 {
                    100.0
                } else {
                    (c.successes as f64 / settled as f64) * 100.0
                };

                (
                    id.clone(),
                    ProviderStats {
                        calls: c.calls,
                        successes: c.successes,
                        errors: c.errors,
                        timeouts: c.timeouts,
                        avg_response_time,
                        reliability,
                    },
                )
            })
            .collect()
    }
}

/// Statistics for a single provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStats {
    pub calls: u64,
    pub successes: u64,
    pub errors: u64,
    pub timeouts: u64,
    /// Rolling average in ms
    pub avg_response_time: Option<u64>,
    /// Percentage of settled calls that succeeded
    pub reliability: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = ProviderMetrics::new();

        metrics.inc_search();
        metrics.record_call("mock");
        metrics.record_outcome("mock", Duration::from_millis(100), true);
        metrics.record_call("mock");
        metrics.record_timeout("mock");

        assert_eq!(metrics.total_searches(), 1);
        assert_eq!(metrics.calls("mock"), 2);
        assert_eq!(metrics.calls("modash"), 0);

        let stats = &metrics.snapshot()["mock"];
        assert_eq!(stats.avg_response_time, Some(100));
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.reliability, 50.0);
    }

    #[test]
    fn test_response_window() {
        let metrics = ProviderMetrics::new();
        for ms in 0..150 {
            metrics.record_outcome("impulze", Duration::from_millis(ms), true);
        }
        // only the last 100 samples (50..150) count
        assert_eq!(metrics.snapshot()["impulze"].avg_response_time, Some(99));
    }
}
