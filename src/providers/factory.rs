//! Provider factory for building providers from configuration

use super::impulze::ImpulzeProvider;
use super::mock::MockProvider;
use super::modash::ModashProvider;
use super::traits::{panic_message, Provider, ProviderError};
use crate::config::{ProviderConfig, ProviderSettings};
use crate::network::HttpClient;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

/// Constructor registered for a provider id
pub type ProviderConstructor = Arc<
    dyn Fn(&ProviderConfig, &HttpClient) -> Result<Box<dyn Provider>, ProviderError> + Send + Sync,
>;

/// Registry of provider constructors keyed by provider id
#[derive(Clone)]
pub struct ProviderFactory {
    client: HttpClient,
    constructors: HashMap<String, ProviderConstructor>,
}

impl ProviderFactory {
    /// Create a factory with no provider types registered
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            constructors: HashMap::new(),
        }
    }

    /// Create a factory with the built-in provider types registered
    pub fn with_builtin(client: HttpClient) -> Self {
        let mut factory = Self::new(client);

        factory.register_provider_type(ImpulzeProvider::ID, |config, client| {
            Ok(Box::new(ImpulzeProvider::from_config(config, client.clone())?))
        });
        factory.register_provider_type(ModashProvider::ID, |config, client| {
            Ok(Box::new(ModashProvider::from_config(config, client.clone())?))
        });
        factory.register_provider_type(MockProvider::ID, |config, _| {
            Ok(Box::new(MockProvider::from_config(config)))
        });

        factory
    }

    /// Register (or replace) the constructor for a provider id
    pub fn register_provider_type<F>(&mut self, id: impl Into<String>, constructor: F)
    where
        F: Fn(&ProviderConfig, &HttpClient) -> Result<Box<dyn Provider>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(id.into(), Arc::new(constructor));
    }

    /// Build one provider.
    ///
    /// Returns `None` when the id is not registered or construction fails or
    /// panics; callers treat that as "provider unavailable".
    pub fn create_provider(&self, config: &ProviderConfig) -> Option<Arc<dyn Provider>> {
        let constructor = match self.constructors.get(&config.id) {
            Some(constructor) => constructor,
            None => {
                error!("No provider constructor registered for ID: {}", config.id);
                return None;
            }
        };

        let built = match catch_unwind(AssertUnwindSafe(|| constructor(config, &self.client))) {
            Ok(built) => built,
            Err(payload) => {
                error!(
                    "Constructor for provider {} panicked: {}",
                    config.id,
                    panic_message(payload)
                );
                return None;
            }
        };

        match built {
            Ok(mut provider) => {
                provider.configure(config.enabled, config.priority);
                info!(
                    "Created provider: {} (priority: {}, enabled: {})",
                    provider.id(),
                    provider.priority(),
                    provider.is_enabled()
                );
                Some(Arc::from(provider))
            }
            Err(e) => {
                error!("Error creating provider {}: {}", config.id, e);
                None
            }
        }
    }

    /// Build every provider that can be constructed, skipping the rest
    pub fn create_providers(&self, configs: &[ProviderConfig]) -> Vec<Arc<dyn Provider>> {
        configs
            .iter()
            .filter_map(|config| self.create_provider(config))
            .collect()
    }

    /// Registered provider ids
    pub fn available_providers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.constructors.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }
}

pub(crate) fn setting_str<'a>(settings: &'a ProviderSettings, key: &str) -> Option<&'a str> {
    settings.get(key).and_then(|v| v.as_str())
}

pub(crate) fn setting_u64(settings: &ProviderSettings, key: &str) -> Option<u64> {
    settings.get(key).and_then(|v| v.as_u64())
}

pub(crate) fn setting_bool(settings: &ProviderSettings, key: &str) -> Option<bool> {
    settings.get(key).and_then(|v| v.as_bool())
}

/// Optional `baseUrl` override, validated as an absolute URL
pub(crate) fn base_url_setting(
    settings: &ProviderSettings,
) -> Result<Option<String>, ProviderError> {
    match setting_str(settings, "baseUrl") {
        Some(raw) => {
            let url = Url::parse(raw)
                .map_err(|e| ProviderError::Config(format!("invalid baseUrl {}: {}", raw, e)))?;
            Ok(Some(url.to_string()))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn factory() -> ProviderFactory {
        ProviderFactory::with_builtin(HttpClient::new().unwrap())
    }

    #[test]
    fn test_builtin_types() {
        assert_eq!(factory().available_providers(), vec!["impulze", "mock", "modash"]);
    }

    #[test]
    fn test_applies_enabled_and_priority() {
        let config = ProviderConfig::new("mock", 42).disabled();
        let provider = factory().create_provider(&config).unwrap();

        assert_eq!(provider.id(), "mock");
        assert_eq!(provider.priority(), 42);
        assert!(!provider.is_enabled());
    }

    #[test]
    fn test_unknown_id_is_unavailable() {
        assert!(factory().create_provider(&ProviderConfig::new("tiktok", 1)).is_none());
    }

    #[test]
    fn test_failed_construction_is_unavailable() {
        // impulze without an accessToken cannot be built
        let configs = vec![
            ProviderConfig::new("impulze", 1),
            ProviderConfig::new("mock", 2),
            ProviderConfig::new("modash", 3).with_setting("baseUrl", json!("not a url")),
        ];
        let providers = factory().create_providers(&configs);

        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id(), "mock");
    }

    #[test]
    fn test_register_provider_type() {
        let mut factory = ProviderFactory::new(HttpClient::new().unwrap());
        assert!(!factory.is_registered("echo"));

        factory.register_provider_type("echo", |_, _| Ok(Box::new(MockProvider::new())));
        let provider = factory.create_provider(&ProviderConfig::new("echo", 7));

        assert!(provider.is_some());
        assert_eq!(provider.unwrap().priority(), 7);
    }

    #[test]
    fn test_panicking_constructor_is_unavailable() {
        let mut factory = factory();
        factory.register_provider_type("boom", |_, _| panic!("constructor exploded"));

        let providers = factory.create_providers(&[
            ProviderConfig::new("boom", 1),
            ProviderConfig::new("mock", 2),
        ]);

        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id(), "mock");
    }

    #[test]
    fn test_base_url_setting() {
        let mut settings = ProviderSettings::new();
        assert_eq!(base_url_setting(&settings).unwrap(), None);

        settings.insert("baseUrl".into(), json!("http://127.0.0.1:9000/api"));
        assert_eq!(
            base_url_setting(&settings).unwrap().as_deref(),
            Some("http://127.0.0.1:9000/api")
        );
    }
}
