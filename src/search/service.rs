//! Search service: configuration-driven owner of the live aggregator

use super::aggregator::{
    AggregationStrategy, AggregatorConfig, AggregatorConfigUpdate, SearchAggregator,
    LAST_RESORT_PROVIDER,
};
use crate::config::{ProviderConfig, ProviderConfigUpdate, SearchConfig, Settings, SettingsUpdate};
use crate::metrics::ProviderMetrics;
use crate::providers::{Provider, ProviderFactory};
use crate::query::SearchQuery;
use crate::results::{codes, ResultError, SearchResult, SEARCH_SERVICE};
use anyhow::Result;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

/// Entry point for creator searches.
///
/// Builds providers from the shared [`SearchConfig`] through the
/// [`ProviderFactory`] on first use, then delegates every query to the
/// aggregator.
pub struct SearchService {
    config: SearchConfig,
    factory: ProviderFactory,
    metrics: Arc<ProviderMetrics>,
    aggregator: RwLock<SearchAggregator>,
    /// Held for the whole of initialization so concurrent callers wait for it
    initialized: Mutex<bool>,
}

impl SearchService {
    /// Create an uninitialized service; providers are built on first use
    pub fn new(config: SearchConfig, factory: ProviderFactory) -> Self {
        let metrics = Arc::new(ProviderMetrics::new());
        Self {
            config,
            factory,
            aggregator: RwLock::new(SearchAggregator::with_metrics(
                Vec::new(),
                AggregatorConfig::default(),
                metrics.clone(),
            )),
            metrics,
            initialized: Mutex::new(false),
        }
    }

    /// Create and initialize a shared service
    pub async fn start(config: SearchConfig, factory: ProviderFactory) -> Result<Arc<Self>> {
        let service = Arc::new(Self::new(config, factory));
        service.initialize().await?;
        Ok(service)
    }

    /// Build providers and the aggregator once.
    ///
    /// Safe to call repeatedly and concurrently. On failure the service stays
    /// uninitialized and the next call retries.
    pub async fn initialize(&self) -> Result<()> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return Ok(());
        }
        self.rebuild(&mut initialized).await
    }

    pub async fn is_initialized(&self) -> bool {
        *self.initialized.lock().await
    }

    /// Discard the live provider set and rebuild it from configuration
    pub async fn reload_configuration(&self) -> Result<()> {
        let mut initialized = self.initialized.lock().await;
        *initialized = false;
        info!("Reloading search configuration");
        self.rebuild(&mut initialized).await
    }

    async fn rebuild(&self, initialized: &mut bool) -> Result<()> {
        let aggregator = self.build_aggregator()?;
        info!(
            "Search service initialized with {} providers (strategy: {})",
            aggregator.providers().len(),
            aggregator.config().strategy
        );
        *self.aggregator.write().await = aggregator;
        *initialized = true;
        Ok(())
    }

    fn build_aggregator(&self) -> Result<SearchAggregator> {
        let settings = self.config.get_config();
        settings.validate()?;

        let enabled: Vec<ProviderConfig> =
            settings.enabled_providers().into_iter().cloned().collect();
        let mut providers = self.factory.create_providers(&enabled);

        if providers.is_empty() {
            warn!(
                "No providers could be created, enabling fallback provider {}",
                LAST_RESORT_PROVIDER
            );
            self.config.update_provider_config(
                LAST_RESORT_PROVIDER,
                ProviderConfigUpdate {
                    id: Some(LAST_RESORT_PROVIDER.to_string()),
                    enabled: Some(true),
                    ..Default::default()
                },
            );
            if let Some(fallback) = self.config.get_provider_config(LAST_RESORT_PROVIDER) {
                providers.extend(self.factory.create_provider(&fallback));
            }
            if providers.is_empty() {
                error!("Fallback provider {} is unavailable", LAST_RESORT_PROVIDER);
            }
        }

        Ok(SearchAggregator::with_metrics(
            providers,
            Self::aggregator_config(&settings),
            self.metrics.clone(),
        ))
    }

    fn aggregator_config(settings: &Settings) -> AggregatorConfig {
        AggregatorConfig {
            strategy: settings.aggregation_strategy,
            default_provider_id: settings
                .default_provider_id
                .clone()
                .or_else(|| Some(LAST_RESORT_PROVIDER.to_string())),
            parallel_execution: settings.parallel_execution,
            request_timeout: Duration::from_millis(settings.request_timeout),
        }
    }

    /// Run a query. Never fails; problems are reported in the result.
    pub async fn search(&self, query: &SearchQuery) -> SearchResult {
        if let Err(e) = self.initialize().await {
            error!("Search service initialization failed: {:#}", e);
            return Self::service_error(format!("Search service unavailable: {}", e));
        }

        // snapshot so no lock is held across provider I/O
        let aggregator = self.aggregator.read().await.clone();

        match AssertUnwindSafe(aggregator.search(query)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!("Aggregator panicked while searching");
                Self::service_error("Unexpected error during search".to_string())
            }
        }
    }

    fn service_error(message: String) -> SearchResult {
        SearchResult::failure(
            SEARCH_SERVICE,
            ResultError::new(message).with_code(codes::SERVICE_ERROR),
        )
    }

    /// Register a provider on the live aggregator without touching configuration
    pub async fn add_provider(&self, provider: Arc<dyn Provider>) -> Result<()> {
        self.initialize().await?;
        self.aggregator.write().await.register_provider(provider);
        Ok(())
    }

    /// Remove a provider from the live aggregator; returns whether it was present
    pub async fn remove_provider(&self, provider_id: &str) -> Result<bool> {
        self.initialize().await?;
        Ok(self.aggregator.write().await.deregister_provider(provider_id))
    }

    /// Providers currently registered, in priority order
    pub async fn providers(&self) -> Vec<Arc<dyn Provider>> {
        self.aggregator.read().await.providers().to_vec()
    }

    /// Change the strategy on the live aggregator and in configuration
    pub async fn update_aggregation_strategy(&self, strategy: AggregationStrategy) {
        self.aggregator
            .write()
            .await
            .update_config(AggregatorConfigUpdate::strategy(strategy));
        self.config.update_config(SettingsUpdate::strategy(strategy));
        info!("Aggregation strategy set to {}", strategy);
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<ProviderMetrics> {
        self.metrics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::HttpClient;
    use crate::providers::stub::StubProvider;
    use crate::providers::MockProvider;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(providers: Vec<ProviderConfig>) -> SearchConfig {
        SearchConfig::new(Settings {
            providers,
            ..Default::default()
        })
    }

    fn factory() -> ProviderFactory {
        let mut factory = ProviderFactory::with_builtin(HttpClient::new().unwrap());
        factory.register_provider_type("stub", |config, _| {
            Ok(Box::new(StubProvider::new(&config.id, config.priority).with_profiles(2)))
        });
        factory
    }

    fn ids(providers: &[Arc<dyn Provider>]) -> Vec<String> {
        providers.iter().map(|p| p.id().to_string()).collect()
    }

    #[tokio::test]
    async fn test_strategy_all_merges_providers() {
        let config = settings(vec![
            ProviderConfig::new("mock", 1),
            ProviderConfig::new("stub", 2),
        ]);
        let service = SearchService::start(config.clone(), factory()).await.unwrap();

        service
            .update_aggregation_strategy(AggregationStrategy::All)
            .await;
        let result = service
            .search(&SearchQuery::new().with_platform("instagram"))
            .await;

        assert_eq!(result.provider, "aggregator");
        let sources: BTreeSet<&str> = result
            .profiles
            .iter()
            .filter_map(|p| p.metadata.get("provider").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(sources, BTreeSet::from(["mock", "stub"]));
        assert_eq!(config.get_config().aggregation_strategy, AggregationStrategy::All);
        assert_eq!(service.metrics().calls("mock"), 1);
    }

    #[tokio::test]
    async fn test_highest_priority_from_settings() {
        let service = SearchService::start(
            settings(vec![ProviderConfig::new("stub", 1), ProviderConfig::new("mock", 2)]),
            factory(),
        )
        .await
        .unwrap();

        let result = service.search(&SearchQuery::new()).await;
        assert_eq!(result.provider, "stub");
        assert_eq!(service.metrics().calls("mock"), 0);
    }

    #[tokio::test]
    async fn test_no_providers_available() {
        // impulze gets force-enabled but cannot be built without a token
        let config = settings(vec![ProviderConfig::new("mock", 10).disabled()]);
        let service = SearchService::start(config.clone(), factory()).await.unwrap();

        let result = service.search(&SearchQuery::new()).await;

        assert!(result.profiles.is_empty());
        assert_eq!(result.error_code(), Some(codes::NO_PROVIDERS));
        assert!(config.get_provider_config("impulze").unwrap().enabled);
    }

    #[tokio::test]
    async fn test_panicking_constructor_leaves_service_usable() {
        let mut factory = factory();
        factory.register_provider_type("boom", |_, _| panic!("constructor exploded"));
        let service = SearchService::start(settings(vec![ProviderConfig::new("boom", 1)]), factory)
            .await
            .unwrap();

        assert!(service.providers().await.is_empty());
        let result = service.search(&SearchQuery::new()).await;
        assert_eq!(result.error_code(), Some(codes::NO_PROVIDERS));
    }

    #[tokio::test]
    async fn test_force_enables_fallback_provider() {
        let config = settings(vec![
            ProviderConfig::new("impulze", 1)
                .disabled()
                .with_setting("accessToken", json!("test-token")),
            ProviderConfig::new("mock", 10).disabled(),
        ]);
        let service = SearchService::start(config.clone(), factory()).await.unwrap();

        assert_eq!(ids(&service.providers().await), vec!["impulze"]);
        assert!(config.get_provider_config("impulze").unwrap().enabled);
    }

    #[tokio::test]
    async fn test_initialization_failure_is_reported() {
        let config = SearchConfig::new(Settings {
            request_timeout: 0,
            ..Default::default()
        });
        let service = SearchService::new(config.clone(), factory());

        assert!(service.initialize().await.is_err());
        let result = service.search(&SearchQuery::new()).await;
        assert_eq!(result.provider, SEARCH_SERVICE);
        assert_eq!(result.error_code(), Some(codes::SERVICE_ERROR));
        assert!(!service.is_initialized().await);

        // a fixed configuration lets the next call succeed
        config.update_config(SettingsUpdate {
            request_timeout: Some(1000),
            providers: Some(vec![ProviderConfig::new("mock", 1)]),
            ..Default::default()
        });
        let result = service.search(&SearchQuery::new()).await;
        assert_eq!(result.provider, "mock");
        assert!(service.is_initialized().await);
    }

    #[tokio::test]
    async fn test_concurrent_initialization_builds_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut factory = factory();
        factory.register_provider_type("counted", move |config, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubProvider::new(&config.id, config.priority)))
        });

        let service =
            SearchService::new(settings(vec![ProviderConfig::new("counted", 1)]), factory);
        let query = SearchQuery::new();
        let (a, b, c) = tokio::join!(
            service.initialize(),
            service.initialize(),
            service.search(&query)
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(c.provider, "counted");
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_add_remove_and_reload() {
        let configs = vec![ProviderConfig::new("mock", 5)];
        let service = SearchService::start(settings(configs), factory())
            .await
            .unwrap();

        service
            .add_provider(StubProvider::new("adhoc", 1).with_profiles(1).into_arc())
            .await
            .unwrap();
        assert_eq!(ids(&service.providers().await), vec!["adhoc", "mock"]);
        assert_eq!(service.search(&SearchQuery::new()).await.provider, "adhoc");

        assert!(service.remove_provider("mock").await.unwrap());
        assert!(!service.remove_provider("mock").await.unwrap());

        // ad hoc registrations do not survive a reload
        service.reload_configuration().await.unwrap();
        assert_eq!(ids(&service.providers().await), vec!["mock"]);
    }

    #[test]
    fn test_search_blocking() {
        let service = SearchService::new(
            settings(vec![ProviderConfig::new("mock", 1)]),
            ProviderFactory::with_builtin(HttpClient::new().unwrap()),
        );
        let query = SearchQuery::new().with_platform("youtube");

        let result = tokio_test::block_on(service.search(&query));

        assert_eq!(result.provider, MockProvider::ID);
        assert_eq!(result.profiles.len(), 1);
        assert_eq!(result.profiles[0].platform_username, "mockyoutube");
    }
}
