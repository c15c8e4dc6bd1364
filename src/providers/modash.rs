//! Modash discovery provider
//!
//! Nested filter/sort body, authenticated with a dashboard session cookie.
//! When the upstream call fails and `fallbackToSample` is on, a small built-in
//! sample response is returned instead; those profiles are flagged with
//! `metadata.substitute = true`.

use super::factory::{base_url_setting, setting_bool, setting_str, setting_u64};
use super::traits::*;
use crate::config::ProviderConfig;
use crate::network::HttpClient;
use crate::query::{SearchQuery, SortField, SortOrder};
use crate::results::{ProfileData, SearchResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const BASE_URL: &str = "https://marketer.modash.io/api/discovery/search/instagram";
const ORIGIN: &str = "https://marketer.modash.io";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Marker added to payloads that did not come from the upstream API
const SUBSTITUTE_KEY: &str = "substitute";

static SAMPLE_RESPONSE: Lazy<Value> = Lazy::new(|| {
    json!({
        "error": false,
        "total": 2,
        "lookalikes": [
            {
                "_id": "sample-1",
                "profileId": "sample-profile-1",
                "profileType": "INSTAGRAM",
                "profileData": {
                    "userId": "12345",
                    "profile": {
                        "engagementRate": 0.05,
                        "engagements": 50000,
                        "followers": 1000000,
                        "fullname": "Sample User 1 (Modash)",
                        "picture": "https://via.placeholder.com/150",
                        "url": "https://www.instagram.com/sampleuser1",
                        "username": "sampleuser1_modash",
                        "isVerified": true,
                        "isPrivate": false
                    },
                    "match": {}
                }
            },
            {
                "_id": "sample-2",
                "profileId": "sample-profile-2",
                "profileType": "INSTAGRAM",
                "profileData": {
                    "userId": "67890",
                    "profile": {
                        "engagementRate": 0.04,
                        "engagements": 40000,
                        "followers": 800000,
                        "fullname": "Sample User 2 (Modash)",
                        "picture": "https://via.placeholder.com/150",
                        "url": "https://www.instagram.com/sampleuser2",
                        "username": "sampleuser2_modash",
                        "isVerified": true,
                        "isPrivate": false
                    },
                    "match": {}
                }
            }
        ],
        "nextPageEnabled": false,
        "currentPage": 0
    })
});

/// Modash discovery provider
pub struct ModashProvider {
    base_url: String,
    cookie: Option<String>,
    request_timeout: Duration,
    fallback_to_sample: bool,
    enabled: bool,
    priority: i32,
    client: HttpClient,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookalikeResponse {
    lookalikes: Option<Vec<Lookalike>>,
    total: Option<u64>,
    #[serde(default)]
    next_page_enabled: bool,
    current_page: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Lookalike {
    #[serde(rename = "_id")]
    id: Option<String>,
    profile_id: Option<String>,
    profile_data: Option<LookalikeData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LookalikeData {
    profile: Option<LookalikeProfile>,
    #[serde(rename = "match")]
    filter_match: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LookalikeProfile {
    engagement_rate: Option<f64>,
    engagements: Option<f64>,
    followers: Option<f64>,
    fullname: Option<String>,
    picture: Option<String>,
    url: Option<String>,
    username: Option<String>,
    is_verified: Option<bool>,
    is_private: Option<bool>,
}

impl ModashProvider {
    pub const ID: &'static str = "modash";

    pub fn new(cookie: Option<String>, client: HttpClient) -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            cookie,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            fallback_to_sample: true,
            enabled: true,
            priority: 2,
            client,
        }
    }

    /// Build from provider settings: `cookie`, `baseUrl`, `requestTimeoutMs`, `fallbackToSample`
    pub fn from_config(config: &ProviderConfig, client: HttpClient) -> Result<Self, ProviderError> {
        let cookie = setting_str(&config.settings, "cookie")
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        if cookie.is_none() {
            warn!(
                "ModashProvider has no session cookie; upstream requests will be unauthenticated"
            );
        }

        let mut provider = Self::new(cookie, client);
        if let Some(url) = base_url_setting(&config.settings)? {
            provider.base_url = url;
        }
        if let Some(ms) = setting_u64(&config.settings, "requestTimeoutMs") {
            provider.request_timeout = Duration::from_millis(ms);
        }
        if let Some(fallback) = setting_bool(&config.settings, "fallbackToSample") {
            provider.fallback_to_sample = fallback;
        }
        Ok(provider)
    }

    fn map_sort_field(field: SortField) -> &'static str {
        match field {
            SortField::AverageLikes => "engagement_likes",
            SortField::EngagementRate => "engagement_rate",
            SortField::FollowerCount => "followers",
        }
    }

    async fn fetch(&self, request: ProviderRequest) -> Result<Value, ProviderError> {
        let response = self.client.execute(request).await?;
        debug!("Modash response status: {}", response.status);

        if !response.is_success() {
            return Err(ProviderError::Http {
                status: response.status,
                body: response.text,
            });
        }

        let data = response.json()?;
        if let Some(error) = error_flag(&data) {
            return Err(ProviderError::Upstream(format!("Modash API returned error: {}", error)));
        }

        debug!(
            "Found {} profiles in Modash response",
            data.get("lookalikes").and_then(|l| l.as_array()).map_or(0, |l| l.len())
        );
        Ok(data)
    }

    fn to_profile(item: Lookalike, substitute: bool) -> ProfileData {
        let data = item.profile_data.unwrap_or_default();
        let profile = data.profile.unwrap_or_default();
        let username = profile.username.unwrap_or_else(|| "unknown".to_string());
        let id = item
            .id
            .unwrap_or_else(|| format!("{}-{}", Self::ID, username));

        let mut normalized = ProfileData::new(id, "instagram", username);
        normalized.external_id = item.profile_id;
        normalized.url = profile.url;
        normalized.image_url = profile.picture;
        normalized.full_name = profile.fullname;
        normalized.is_verified = profile.is_verified.unwrap_or(false);
        normalized.account_type = Some(
            if profile.is_private.unwrap_or(false) {
                "PRIVATE"
            } else {
                "PUBLIC"
            }
            .to_string(),
        );
        normalized.follower_count = profile
            .followers
            .filter(|f| f.is_finite())
            .map_or(0, |f| f.max(0.0).round() as u64);
        normalized.engagement_rate = Some(profile.engagement_rate.unwrap_or(0.0));
        normalized.average_likes = Some(profile.engagements.unwrap_or(0.0));

        let mut normalized = normalized
            .with_metadata("filterMatch", data.filter_match.unwrap_or_else(|| json!({})))
            .with_metadata("provider", json!(Self::ID));
        if substitute {
            normalized = normalized.with_metadata(SUBSTITUTE_KEY, json!(true));
        }

        normalized.sanitized()
    }
}

/// The `error` field when it signals a failure (anything but absent, null or false)
fn error_flag(data: &Value) -> Option<&Value> {
    data.get("error")
        .filter(|e| !e.is_null() && e.as_bool() != Some(false))
}

#[async_trait]
impl Provider for ModashProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Modash"
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
        platform_matches(query, Self::ID) || query.targets_platform("instagram")
    }

    fn translate(&self, query: &SearchQuery) -> Result<ProviderRequest, ProviderError> {
        let locations: Vec<Value> = query
            .creator_locations
            .iter()
            .map(|name| json!({ "type": "country", "name": name }))
            .collect();
        let usernames: Vec<&str> = query.username.as_deref().into_iter().collect();

        let sort = match query.sort_by {
            Some(ref sort_by) => {
                let direction = match sort_by.order {
                    SortOrder::Ascending => "asc",
                    SortOrder::Descending => "desc",
                };
                json!({
                    "field": Self::map_sort_field(sort_by.sort_field()),
                    "direction": direction,
                })
            }
            None => json!({}),
        };

        let body = json!({
            "page": query.offset.unwrap_or(0),
            "filters": {
                "influencer": {
                    "accountTypes": [],
                    "location": locations,
                    "hasContactDetails": [],
                    "relevance": {
                        "usernames": usernames,
                        "hashtags": [],
                    },
                    "textTags": [],
                    "interests": [],
                    "keywords": query.keywords().unwrap_or_default(),
                    "brands": [],
                },
                "audience": {
                    "location": [],
                    "age": [],
                    "interests": [],
                    "brands": [],
                },
                "actions": [],
                "options": { "showSavedProfiles": true },
                "relevanceType": "relevance",
            },
            "sort": sort,
        });
        debug!("Modash API parameters: {}", body);

        let mut request = ProviderRequest::post(&self.base_url)
            .header("content-type", "application/json")
            .header("origin", ORIGIN)
            .header("referer", format!("{}/discovery/instagram", ORIGIN))
            .json(body)
            .timeout(self.request_timeout);
        if let Some(ref cookie) = self.cookie {
            request = request.header("cookie", cookie);
        }

        Ok(request)
    }

    async fn execute(&self, request: ProviderRequest) -> Result<Value, ProviderError> {
        match self.fetch(request).await {
            Ok(data) => Ok(data),
            Err(e) if self.fallback_to_sample => {
                warn!("Modash request failed ({}); returning sample data", e);
                let mut sample = SAMPLE_RESPONSE.clone();
                sample[SUBSTITUTE_KEY] = json!(true);
                sample["upstreamError"] = json!(e.to_string());
                Ok(sample)
            }
            Err(e) => Err(e),
        }
    }

    fn normalize(&self, raw: Value) -> Result<SearchResult, ProviderError> {
        if raw.get("error").and_then(|e| e.as_bool()) == Some(true) {
            return Err(ProviderError::Authentication(
                "Authentication failed for Modash API".to_string(),
            ));
        }

        let substitute = raw.get(SUBSTITUTE_KEY).and_then(|s| s.as_bool()) == Some(true);
        let response: LookalikeResponse = serde_json::from_value(raw.clone())?;
        let items = response
            .lookalikes
            .ok_or_else(|| ProviderError::InvalidResponse("no lookalikes array".to_string()))?;

        let profiles: Vec<ProfileData> = items
            .into_iter()
            .map(|item| Self::to_profile(item, substitute))
            .collect();

        let mut raw_summary = json!({
            "total": response.total,
            "currentPage": response.current_page,
            "provider": Self::ID,
        });
        if substitute {
            raw_summary[SUBSTITUTE_KEY] = json!(true);
            raw_summary["upstreamError"] = raw.get("upstreamError").cloned().unwrap_or(Value::Null);
        }

        Ok(SearchResult {
            total_count: Some(response.total.unwrap_or(profiles.len() as u64)),
            next_page_token: response
                .next_page_enabled
                .then(|| (response.current_page.unwrap_or(0) + 1).to_string()),
            raw_response: Some(raw_summary),
            ..SearchResult::new(Self::ID, profiles)
        })
    }
}
