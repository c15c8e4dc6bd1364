//! Multi-provider search aggregation

use crate::metrics::ProviderMetrics;
use crate::providers::{panic_message, Provider};
use crate::query::SearchQuery;
use crate::results::{codes, ProfileContainer, ResultError, SearchResult, AGGREGATOR};
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Provider consulted when no registered provider claims a query
pub const LAST_RESORT_PROVIDER: &str = "impulze";

/// How many providers are consulted and how their results combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Query every applicable provider and merge
    #[default]
    All,
    /// Query only the first applicable provider by priority
    HighestPriority,
    /// Try the default provider, then the rest in priority order
    SpecifiedWithFallback,
}

impl AggregationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::HighestPriority => "highest_priority",
            Self::SpecifiedWithFallback => "specified_with_fallback",
        }
    }
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown aggregation strategy: {0}")]
pub struct ParseStrategyError(String);

impl FromStr for AggregationStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all" => Ok(Self::All),
            "highest_priority" => Ok(Self::HighestPriority),
            "specified_with_fallback" => Ok(Self::SpecifiedWithFallback),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}

/// Aggregator policy
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    pub strategy: AggregationStrategy,
    pub default_provider_id: Option<String>,
    pub parallel_execution: bool,
    /// Per-provider time box under the parallel `all` strategy
    pub request_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            strategy: AggregationStrategy::All,
            default_provider_id: None,
            parallel_execution: true,
            request_timeout: Duration::from_millis(10_000),
        }
    }
}

/// Partial update for [`AggregatorConfig`]
#[derive(Debug, Clone, Default)]
pub struct AggregatorConfigUpdate {
    pub strategy: Option<AggregationStrategy>,
    pub default_provider_id: Option<Option<String>>,
    pub parallel_execution: Option<bool>,
    pub request_timeout: Option<Duration>,
}

impl AggregatorConfigUpdate {
    pub fn strategy(strategy: AggregationStrategy) -> Self {
        Self {
            strategy: Some(strategy),
            ..Default::default()
        }
    }
}

/// Why a provider call produced no result of its own
enum CallFailure {
    Panicked(String),
    TimedOut,
}

/// Holds the live provider set and runs queries against it.
///
/// Cloning is cheap and yields an independent snapshot sharing the same
/// provider instances and metrics.
#[derive(Clone)]
pub struct SearchAggregator {
    /// Sorted ascending by priority
    providers: Vec<Arc<dyn Provider>>,
    config: AggregatorConfig,
    metrics: Arc<ProviderMetrics>,
}

impl SearchAggregator {
    pub fn new(providers: Vec<Arc<dyn Provider>>, config: AggregatorConfig) -> Self {
        Self::with_metrics(providers, config, Arc::new(ProviderMetrics::new()))
    }

    pub fn with_metrics(
        mut providers: Vec<Arc<dyn Provider>>,
        config: AggregatorConfig,
        metrics: Arc<ProviderMetrics>,
    ) -> Self {
        providers.sort_by_key(|p| p.priority());
        Self {
            providers,
            config,
            metrics,
        }
    }

    /// Add a provider, replacing any existing provider with the same id
    pub fn register_provider(&mut self, provider: Arc<dyn Provider>) {
        self.providers.retain(|p| p.id() != provider.id());
        info!(
            "Registered provider {} (priority: {})",
            provider.id(),
            provider.priority()
        );
        self.providers.push(provider);
        self.providers.sort_by_key(|p| p.priority());
    }

    /// Remove a provider by id; returns whether one was removed
    pub fn deregister_provider(&mut self, provider_id: &str) -> bool {
        let before = self.providers.len();
        self.providers.retain(|p| p.id() != provider_id);
        let removed = self.providers.len() != before;
        if removed {
            info!("Deregistered provider {}", provider_id);
        }
        removed
    }

    pub fn update_config(&mut self, update: AggregatorConfigUpdate) {
        if let Some(strategy) = update.strategy {
            self.config.strategy = strategy;
        }
        if let Some(default_provider_id) = update.default_provider_id {
            self.config.default_provider_id = default_provider_id;
        }
        if let Some(parallel) = update.parallel_execution {
            self.config.parallel_execution = parallel;
        }
        if let Some(request_timeout) = update.request_timeout {
            self.config.request_timeout = request_timeout;
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub fn metrics(&self) -> &Arc<ProviderMetrics> {
        &self.metrics
    }

    /// Run a query under the configured strategy.
    ///
    /// Never fails: provider errors, timeouts and panics are reported in the
    /// returned result.
    pub async fn search(&self, query: &SearchQuery) -> SearchResult {
        self.metrics.inc_search();

        let applicable: Vec<Arc<dyn Provider>> = self
            .providers
            .iter()
            .filter(|p| p.is_enabled() && p.can_handle(query))
            .cloned()
            .collect();

        if applicable.is_empty() {
            return match self
                .providers
                .iter()
                .find(|p| p.id() == LAST_RESORT_PROVIDER && p.is_enabled())
            {
                // answered directly, whatever the strategy
                Some(provider) => {
                    info!(
                        "No provider claims this query, falling back to {}",
                        LAST_RESORT_PROVIDER
                    );
                    self.search_single(provider, query).await
                }
                None => {
                    warn!("No providers available for query");
                    SearchResult::failure(
                        AGGREGATOR,
                        ResultError::new("No providers available for this query")
                            .with_code(codes::NO_PROVIDERS),
                    )
                }
            };
        }

        debug!(
            "Searching {} applicable providers with strategy {}",
            applicable.len(),
            self.config.strategy
        );

        match self.config.strategy {
            AggregationStrategy::HighestPriority => {
                self.search_single(&applicable[0], query).await
            }
            AggregationStrategy::SpecifiedWithFallback => {
                self.search_with_fallback(applicable, query).await
            }
            AggregationStrategy::All => self.search_all(&applicable, query).await,
        }
    }

    /// One provider's own result, with panics turned into an error result
    async fn search_single(
        &self,
        provider: &Arc<dyn Provider>,
        query: &SearchQuery,
    ) -> SearchResult {
        match self.call(provider, query).await {
            Ok(result) => result,
            Err(failure) => {
                Self::failure_result(provider.id(), failure, self.config.request_timeout)
            }
        }
    }

    async fn search_with_fallback(
        &self,
        mut candidates: Vec<Arc<dyn Provider>>,
        query: &SearchQuery,
    ) -> SearchResult {
        if let Some(ref default_id) = self.config.default_provider_id {
            if let Some(pos) = candidates.iter().position(|p| p.id() == default_id) {
                let preferred = candidates.remove(pos);
                candidates.insert(0, preferred);
            }
        }

        for provider in &candidates {
            match self.call(provider, query).await {
                Ok(result) if result.is_conclusive() => return result,
                Ok(_) => debug!("{} returned nothing usable, trying next provider", provider.id()),
                Err(CallFailure::Panicked(message)) => {
                    warn!("Provider {} panicked: {}", provider.id(), message)
                }
                Err(CallFailure::TimedOut) => {}
            }
        }

        SearchResult::failure(
            AGGREGATOR,
            ResultError::new("All providers failed to return results")
                .with_code(codes::ALL_PROVIDERS_FAILED),
        )
    }

    async fn search_all(
        &self,
        providers: &[Arc<dyn Provider>],
        query: &SearchQuery,
    ) -> SearchResult {
        let request_timeout = self.config.request_timeout;
        let mut container = ProfileContainer::new();

        if self.config.parallel_execution {
            let futures = providers.iter().map(|provider| async move {
                let outcome = match timeout(request_timeout, self.call(provider, query)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("Timeout for provider {}", provider.id());
                        self.metrics.record_timeout(provider.id());
                        Err(CallFailure::TimedOut)
                    }
                };
                (provider.id(), outcome)
            });

            for (id, outcome) in join_all(futures).await {
                match outcome {
                    Ok(result) => container.add_result(result),
                    Err(failure) => {
                        container.add_result(Self::failure_result(id, failure, request_timeout))
                    }
                }
            }
        } else {
            for provider in providers {
                match self.call(provider, query).await {
                    Ok(result) => container.add_result(result),
                    Err(failure) => container.add_result(Self::failure_result(
                        provider.id(),
                        failure,
                        request_timeout,
                    )),
                }
            }
        }

        info!(
            "Aggregated {} profiles from {} providers ({} errors)",
            container.len(),
            providers.len(),
            container.errors().len()
        );

        container.into_result(AGGREGATOR)
    }

    /// Invoke one provider, containing panics and recording metrics
    async fn call(
        &self,
        provider: &Arc<dyn Provider>,
        query: &SearchQuery,
    ) -> Result<SearchResult, CallFailure> {
        let id = provider.id();
        let start = Instant::now();
        self.metrics.record_call(id);

        let outcome = AssertUnwindSafe(provider.search(query)).catch_unwind().await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(mut result) => {
                if result.provider.is_empty() {
                    result.provider = id.to_string();
                }
                self.metrics.record_outcome(id, elapsed, result.error.is_none());
                debug!(
                    "Provider {} returned {} profiles in {:?}",
                    id,
                    result.profiles.len(),
                    elapsed
                );
                Ok(result)
            }
            Err(payload) => {
                self.metrics.record_outcome(id, elapsed, false);
                Err(CallFailure::Panicked(panic_message(payload)))
            }
        }
    }

    fn failure_result(
        provider_id: &str,
        failure: CallFailure,
        request_timeout: Duration,
    ) -> SearchResult {
        let error = match failure {
            CallFailure::Panicked(message) => {
                ResultError::new(format!("Provider {} failed: {}", provider_id, message))
                    .with_code(codes::PROVIDER_PANIC)
            }
            CallFailure::TimedOut => ResultError::new(format!(
                "Provider {} timed out after {}ms",
                provider_id,
                request_timeout.as_millis()
            ))
            .with_code(codes::TIMEOUT),
        };
        SearchResult::failure(provider_id, error)
    }
}
