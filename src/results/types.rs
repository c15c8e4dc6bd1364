//! Result type definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Error codes carried in [`ResultError::code`]
pub mod codes {
    pub const NO_PROVIDERS: &str = "NO_PROVIDERS";
    pub const ALL_PROVIDERS_FAILED: &str = "ALL_PROVIDERS_FAILED";
    pub const NO_RESULTS: &str = "NO_RESULTS";
    pub const ACCESS_LIMITED: &str = "ACCESS_LIMITED";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const HTTP_ERROR: &str = "HTTP_ERROR";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const INVALID_RESPONSE: &str = "INVALID_RESPONSE";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const AUTHENTICATION_FAILED: &str = "AUTHENTICATION_FAILED";
    pub const INVALID_QUERY: &str = "INVALID_QUERY";
    pub const CONFIGURATION_ERROR: &str = "CONFIGURATION_ERROR";
    pub const PROVIDER_PANIC: &str = "PROVIDER_PANIC";
    pub const SERVICE_ERROR: &str = "SERVICE_ERROR";
}

/// Provider name used for results produced by the aggregator itself
pub const AGGREGATOR: &str = "aggregator";

/// Provider name used for results produced by the search service itself
pub const SEARCH_SERVICE: &str = "search-service";

/// A normalized creator profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub id: String,
    pub platform: String,
    pub platform_username: String,
    pub external_id: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub full_name: Option<String>,
    pub introduction: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    pub account_type: Option<String>,
    pub gender: Option<String>,
    pub age_group: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub follower_count: u64,
    pub subscriber_count: Option<u64>,
    pub content_count: Option<u64>,
    /// Fraction in [0, 1]
    pub engagement_rate: Option<f64>,
    pub average_likes: Option<f64>,
    pub average_views: Option<f64>,
    pub location: Option<String>,
    #[serde(default)]
    pub contact_details: Vec<Value>,
    /// Provider-specific extras
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ProfileData {
    pub fn new(
        id: impl Into<String>,
        platform: impl Into<String>,
        platform_username: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            platform: platform.into(),
            platform_username: platform_username.into(),
            ..Default::default()
        }
    }

    /// Key used to detect the same creator reported by several providers
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.platform, self.platform_username)
    }

    /// Number of populated top-level fields, used to pick the richer of two duplicates
    pub fn populated_fields(&self) -> usize {
        let optional = [
            self.external_id.is_some(),
            self.url.is_some(),
            self.image_url.is_some(),
            self.full_name.is_some(),
            self.introduction.is_some(),
            self.account_type.is_some(),
            self.gender.is_some(),
            self.age_group.is_some(),
            self.language.is_some(),
            self.subscriber_count.is_some(),
            self.content_count.is_some(),
            self.engagement_rate.is_some(),
            self.average_likes.is_some(),
            self.average_views.is_some(),
            self.location.is_some(),
        ];

        // id, platform, platform_username, is_verified, follower_count,
        // contact_details and metadata are always present
        7 + optional.iter().filter(|present| **present).count()
    }

    /// Enforce the numeric invariants on values coming from upstream payloads
    pub fn sanitized(mut self) -> Self {
        self.engagement_rate = self
            .engagement_rate
            .filter(|rate| rate.is_finite())
            .map(|rate| rate.clamp(0.0, 1.0));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Error attached to a search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ResultError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

/// Normalized result of one search call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub profiles: Vec<ProfileData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Which provider (or "aggregator") produced this result
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

impl SearchResult {
    pub fn new(provider: impl Into<String>, profiles: Vec<ProfileData>) -> Self {
        Self {
            profiles,
            total_count: None,
            next_page_token: None,
            provider: provider.into(),
            error: None,
            raw_response: None,
        }
    }

    /// An empty result carrying only an error
    pub fn failure(provider: impl Into<String>, error: ResultError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(provider, Vec::new())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Whether a fallback chain should stop at this result
    pub fn is_conclusive(&self) -> bool {
        !self.profiles.is_empty()
            || self
                .error
                .as_ref()
                .map_or(false, |e| !e.has_code(codes::NO_RESULTS))
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.code.as_deref())
    }
}

/// Per-provider errors collected during a multi-provider search
pub type ProviderErrors = BTreeMap<String, ResultError>;
