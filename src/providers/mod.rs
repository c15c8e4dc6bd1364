//! Search providers module
//!
//! Each provider adapts one upstream discovery API to the normalized
//! query/result shapes.

mod factory;
mod traits;

pub mod impulze;
pub mod mock;
pub mod modash;

pub use factory::{ProviderConstructor, ProviderFactory};
pub use impulze::ImpulzeProvider;
pub use mock::MockProvider;
pub use modash::ModashProvider;
pub use traits::*;

#[cfg(test)]
pub(crate) mod stub {
    //! Scriptable provider for aggregator and service tests

    use super::traits::*;
    use crate::query::SearchQuery;
    use crate::results::{ProfileData, SearchResult};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    pub enum Behavior {
        Respond(SearchResult),
        Panic,
    }

    pub struct StubProvider {
        id: String,
        priority: i32,
        enabled: bool,
        platforms: Option<Vec<String>>,
        delay: Duration,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl StubProvider {
        pub fn new(id: &str, priority: i32) -> Self {
            Self {
                id: id.to_string(),
                priority,
                enabled: true,
                platforms: None,
                delay: Duration::ZERO,
                behavior: Behavior::Respond(SearchResult::new(id, Vec::new())),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Return `count` instagram profiles named `<id>_<n>`
        pub fn with_profiles(self, count: usize) -> Self {
            let profiles = (0..count)
                .map(|n| {
                    profile(&format!("{}-{}", self.id, n), &format!("{}_{}", self.id, n))
                        .with_metadata("provider", json!(self.id))
                })
                .collect();
            let id = self.id.clone();
            self.responding(SearchResult::new(id, profiles))
        }

        pub fn responding(mut self, result: SearchResult) -> Self {
            self.behavior = Behavior::Respond(result);
            self
        }

        pub fn panicking(mut self) -> Self {
            self.behavior = Behavior::Panic;
            self
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn disabled(mut self) -> Self {
            self.enabled = false;
            self
        }

        pub fn handling(mut self, platforms: &[&str]) -> Self {
            self.platforms = Some(platforms.iter().map(|p| p.to_string()).collect());
            self
        }

        /// Shared call counter, readable after the stub is moved into an `Arc`
        pub fn calls(&self) -> Arc<AtomicUsize> {
            self.calls.clone()
        }

        pub fn into_arc(self) -> Arc<dyn Provider> {
            Arc::new(self)
        }
    }

    pub fn profile(id: &str, username: &str) -> ProfileData {
        ProfileData::new(id, "instagram", username)
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            "Stub Provider"
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn configure(&mut self, enabled: bool, priority: i32) {
            self.enabled = enabled;
            self.priority = priority;
        }

        fn can_handle(&self, query: &SearchQuery) -> bool {
            match (&self.platforms, &query.platform) {
                (Some(platforms), Some(_)) => platforms.iter().any(|p| query.targets_platform(p)),
                _ => true,
            }
        }

        fn translate(&self, _query: &SearchQuery) -> Result<ProviderRequest, ProviderError> {
            Ok(ProviderRequest::get("memory://stub"))
        }

        async fn execute(&self, _request: ProviderRequest) -> Result<Value, ProviderError> {
            Ok(Value::Null)
        }

        fn normalize(&self, _raw: Value) -> Result<SearchResult, ProviderError> {
            Ok(SearchResult::new(self.id.clone(), Vec::new()))
        }

        async fn search(&self, _query: &SearchQuery) -> SearchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.behavior {
                Behavior::Respond(result) => result.clone(),
                Behavior::Panic => panic!("stub provider {} exploded", self.id),
            }
        }
    }
}
