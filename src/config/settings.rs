//! Settings structures for creator-search configuration

use crate::search::AggregationStrategy;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Provider-specific settings, opaque to everything but the provider itself
pub type ProviderSettings = Map<String, Value>;

/// Priority given to provider entries inserted without one
pub const DEFAULT_PROVIDER_PRIORITY: i32 = 999;

/// Top-level search service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Declarative provider list
    pub providers: Vec<ProviderConfig>,
    pub aggregation_strategy: AggregationStrategy,
    /// Provider tried first under `specified_with_fallback`
    pub default_provider_id: Option<String>,
    /// Run providers concurrently under the `all` strategy
    pub parallel_execution: bool,
    /// Per-provider timeout in milliseconds
    pub request_timeout: u64,
    pub outgoing: OutgoingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            aggregation_strategy: AggregationStrategy::HighestPriority,
            default_provider_id: Some("impulze".to_string()),
            parallel_execution: true,
            request_timeout: 15_000,
            outgoing: OutgoingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables
    ///
    /// Credentials are only ever taken from here or from the settings file.
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("CREATOR_SEARCH_STRATEGY") {
            match val.parse() {
                Ok(strategy) => self.aggregation_strategy = strategy,
                Err(e) => warn!("Ignoring CREATOR_SEARCH_STRATEGY: {}", e),
            }
        }
        if let Ok(val) = std::env::var("CREATOR_SEARCH_DEFAULT_PROVIDER") {
            self.default_provider_id = Some(val);
        }
        if let Ok(val) = std::env::var("CREATOR_SEARCH_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.request_timeout = ms;
            }
        }
        if let Ok(val) = std::env::var("CREATOR_SEARCH_PARALLEL") {
            self.parallel_execution = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("IMPULZE_ACCESS_TOKEN") {
            self.set_provider_setting("impulze", "accessToken", Value::String(val));
        }
        if let Ok(val) = std::env::var("MODASH_COOKIE") {
            self.set_provider_setting("modash", "cookie", Value::String(val));
        }
    }

    /// Check for configuration that cannot produce a working provider set
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout == 0 {
            bail!("requestTimeout must be greater than zero");
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                bail!("provider entries must have a non-empty id");
            }
            if !seen.insert(provider.id.as_str()) {
                bail!("duplicate provider id: {}", provider.id);
            }
        }

        Ok(())
    }

    /// Get provider config by id
    pub fn get_provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn get_provider_mut(&mut self, id: &str) -> Option<&mut ProviderConfig> {
        self.providers.iter_mut().find(|p| p.id == id)
    }

    /// Get all enabled providers
    pub fn enabled_providers(&self) -> Vec<&ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }

    fn set_provider_setting(&mut self, id: &str, key: &str, value: Value) {
        if let Some(provider) = self.get_provider_mut(id) {
            provider.settings.insert(key.to_string(), value);
        }
    }
}

/// Partial update for [`Settings`]; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub providers: Option<Vec<ProviderConfig>>,
    pub aggregation_strategy: Option<AggregationStrategy>,
    pub default_provider_id: Option<Option<String>>,
    pub parallel_execution: Option<bool>,
    pub request_timeout: Option<u64>,
    pub outgoing: Option<OutgoingSettings>,
}

impl SettingsUpdate {
    pub fn strategy(strategy: AggregationStrategy) -> Self {
        Self {
            aggregation_strategy: Some(strategy),
            ..Default::default()
        }
    }

    pub(crate) fn apply(self, settings: &mut Settings) {
        if let Some(providers) = self.providers {
            settings.providers = providers;
        }
        if let Some(strategy) = self.aggregation_strategy {
            settings.aggregation_strategy = strategy;
        }
        if let Some(default_provider_id) = self.default_provider_id {
            settings.default_provider_id = default_provider_id;
        }
        if let Some(parallel) = self.parallel_execution {
            settings.parallel_execution = parallel;
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(outgoing) = self.outgoing {
            settings.outgoing = outgoing;
        }
    }
}

/// Individual provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider identifier, also the factory registry key
    pub id: String,
    pub enabled: bool,
    /// Lower is higher precedence
    pub priority: i32,
    /// Additional provider-specific settings
    pub settings: ProviderSettings,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            enabled: true,
            priority: DEFAULT_PROVIDER_PRIORITY,
            settings: Map::new(),
        }
    }
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            priority,
            ..Default::default()
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }
}

/// Partial update for a [`ProviderConfig`]
#[derive(Debug, Clone, Default)]
pub struct ProviderConfigUpdate {
    pub id: Option<String>,
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
    pub settings: Option<ProviderSettings>,
}

impl ProviderConfigUpdate {
    pub(crate) fn apply(self, config: &mut ProviderConfig) {
        if let Some(id) = self.id {
            config.id = id;
        }
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(priority) = self.priority {
            config.priority = priority;
        }
        if let Some(settings) = self.settings {
            config.settings = settings;
        }
    }

    /// Build a new entry; requires `id`
    pub(crate) fn into_config(self) -> Option<ProviderConfig> {
        let id = self.id?;
        Some(ProviderConfig {
            id,
            enabled: self.enabled.unwrap_or(true),
            priority: self.priority.unwrap_or(DEFAULT_PROVIDER_PRIORITY),
            settings: self.settings.unwrap_or_default(),
        })
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy for all outgoing requests
    pub proxy: Option<String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 30.0,
            pool_maxsize: 20,
            verify_ssl: true,
            proxy: None,
        }
    }
}

/// Default provider configurations
fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("impulze", 1),
        ProviderConfig::new("modash", 2),
        ProviderConfig::new("mock", 10).disabled(),
    ]
}
