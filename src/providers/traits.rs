//! Provider traits and types

use crate::query::SearchQuery;
use crate::results::{codes, ResultError, SearchResult};
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure inside a provider's translate/execute/normalize pipeline
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Upstream signalled that the account hit its usage limit
    #[error("Access limited: {0}")]
    AccessLimited(String),

    #[error("API request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response format from provider: {0}")]
    InvalidResponse(String),

    /// Upstream answered successfully but reported an error in the payload
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid provider configuration: {0}")]
    Config(String),
}

impl ProviderError {
    /// Error code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccessLimited(_) => codes::ACCESS_LIMITED,
            Self::Http { .. } => codes::HTTP_ERROR,
            Self::Network(e) if e.is_timeout() => codes::TIMEOUT,
            Self::Network(_) => codes::NETWORK_ERROR,
            Self::InvalidResponse(_) => codes::INVALID_RESPONSE,
            Self::Upstream(_) => codes::UPSTREAM_ERROR,
            Self::Authentication(_) => codes::AUTHENTICATION_FAILED,
            Self::InvalidQuery(_) => codes::INVALID_QUERY,
            Self::Config(_) => codes::CONFIGURATION_ERROR,
        }
    }

    pub fn to_result_error(&self) -> ResultError {
        let error = ResultError::new(self.to_string()).with_code(self.code());
        match self {
            Self::Http { status, .. } => {
                error.with_details(serde_json::json!({ "status": status }))
            }
            _ => error,
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Provider-native request produced by [`Provider::translate`]
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    /// JSON body
    pub body: Option<Value>,
    /// Transport timeout; aborts the underlying call when it fires
    pub timeout: Option<Duration>,
}

impl ProviderRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(url)
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP response from a provider request
#[derive(Debug)]
pub struct ProviderResponse {
    pub status: u16,
    pub text: String,
}

impl ProviderResponse {
    /// Parse response as JSON
    pub fn json(&self) -> Result<Value, ProviderError> {
        Ok(serde_json::from_str(&self.text)?)
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response indicates rate limiting
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Readable message from a caught panic payload
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Default applicability rule: no platform requested, or the platform is this provider's id
pub fn platform_matches(query: &SearchQuery, id: &str) -> bool {
    query.platform.is_none() || query.targets_platform(id)
}

/// A search backend that can answer normalized queries
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique identifier, also the factory key
    fn id(&self) -> &str;

    /// Display name
    fn name(&self) -> &str;

    /// Lower number means higher precedence
    fn priority(&self) -> i32;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Apply configured enabled flag and priority.
    ///
    /// Providers whose properties are fixed keep the default no-op.
    fn configure(&mut self, _enabled: bool, _priority: i32) {}

    /// Whether this provider is willing to service the query
    fn can_handle(&self, query: &SearchQuery) -> bool {
        platform_matches(query, self.id())
    }

    /// Build the provider-native request
    fn translate(&self, query: &SearchQuery) -> Result<ProviderRequest, ProviderError>;

    /// Perform the request and return the raw payload
    async fn execute(&self, request: ProviderRequest) -> Result<Value, ProviderError>;

    /// Convert the raw payload into the normalized result
    fn normalize(&self, raw: Value) -> Result<SearchResult, ProviderError>;

    /// Run translate, execute and normalize, propagating the first failure
    async fn run(&self, query: &SearchQuery) -> Result<SearchResult, ProviderError> {
        let request = self.translate(query)?;
        let raw = self.execute(request).await?;
        self.normalize(raw)
    }

    /// Search for profiles.
    ///
    /// Never fails: any error becomes an empty result carrying that error.
    async fn search(&self, query: &SearchQuery) -> SearchResult {
        match self.run(query).await {
            Ok(mut result) => {
                result.provider = self.id().to_string();
                debug!("{} returned {} profiles", self.name(), result.profiles.len());
                result
            }
            Err(e) => {
                warn!("Error in {} provider: {}", self.name(), e);
                SearchResult::failure(self.id(), e.to_result_error())
            }
        }
    }
}
