//! Configuration module for creator-search
//!
//! [`Settings`] is the declarative description of providers and aggregation
//! policy. [`SearchConfig`] is the shared, runtime-mutable holder handed to
//! whoever needs it; clones share the same underlying settings.

mod settings;

pub use settings::*;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Shared, mutable search configuration
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    inner: Arc<RwLock<Settings>>,
}

impl SearchConfig {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Settings> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Settings> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the current settings
    pub fn get_config(&self) -> Settings {
        self.read().clone()
    }

    /// Merge a partial update into the current settings
    pub fn update_config(&self, update: SettingsUpdate) {
        update.apply(&mut self.write());
    }

    pub fn get_provider_config(&self, provider_id: &str) -> Option<ProviderConfig> {
        self.read().get_provider(provider_id).cloned()
    }

    /// Update a provider entry, or insert it if it does not exist yet.
    ///
    /// Inserting requires `update.id`; an update without one for an unknown
    /// provider is ignored.
    pub fn update_provider_config(&self, provider_id: &str, update: ProviderConfigUpdate) {
        let mut settings = self.write();

        if let Some(existing) = settings.get_provider_mut(provider_id) {
            update.apply(existing);
        } else if let Some(config) = update.into_config() {
            debug!("Adding provider config: {}", config.id);
            settings.providers.push(config);
        } else {
            debug!("Ignoring update for unknown provider without id: {}", provider_id);
        }
    }

    pub fn remove_provider_config(&self, provider_id: &str) {
        self.write().providers.retain(|p| p.id != provider_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::AggregationStrategy;

    #[test]
    fn test_clones_share_state() {
        let config = SearchConfig::default();
        let other = config.clone();

        other.update_config(SettingsUpdate::strategy(AggregationStrategy::All));
        assert_eq!(config.get_config().aggregation_strategy, AggregationStrategy::All);
    }

    #[test]
    fn test_update_existing_provider_merges() {
        let config = SearchConfig::default();
        config.update_provider_config(
            "mock",
            ProviderConfigUpdate {
                enabled: Some(true),
                ..Default::default()
            },
        );

        let mock = config.get_provider_config("mock").unwrap();
        assert!(mock.enabled);
        assert_eq!(mock.priority, 10);
    }

    #[test]
    fn test_upsert_new_provider() {
        let config = SearchConfig::default();

        config.update_provider_config("ghost", ProviderConfigUpdate::default());
        assert!(config.get_provider_config("ghost").is_none());

        config.update_provider_config(
            "extra",
            ProviderConfigUpdate {
                id: Some("extra".to_string()),
                priority: Some(5),
                ..Default::default()
            },
        );
        let extra = config.get_provider_config("extra").unwrap();
        assert!(extra.enabled);
        assert_eq!(extra.priority, 5);
    }

    #[test]
    fn test_remove_provider() {
        let config = SearchConfig::default();
        config.remove_provider_config("modash");
        assert!(config.get_provider_config("modash").is_none());
        assert_eq!(config.get_config().providers.len(), 2);
    }
}
