//! Deterministic in-memory provider over a fixed seed list
//!
//! Useful for tests and demos: it filters, sorts and paginates the seed the
//! same way a real discovery API would, without touching the network.

use super::factory::setting_u64;
use super::traits::*;
use crate::config::ProviderConfig;
use crate::query::{SearchQuery, SortField, SortOrder};
use crate::results::{ProfileData, SearchResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::time::Duration;

const DEFAULT_LIMIT: usize = 10;

#[allow(clippy::too_many_arguments)]
fn seed(
    n: u32,
    platform: &str,
    username: &str,
    full_name: &str,
    verified: bool,
    followers: u64,
    engagement_rate: f64,
    average_likes: f64,
    location: &str,
) -> ProfileData {
    let mut profile = ProfileData::new(format!("mock-{}", n), platform, username);
    profile.external_id = Some(format!("mock-ext-{}", n));
    profile.url = Some(format!("https://{}.com/{}", platform, username));
    profile.image_url = Some("https://via.placeholder.com/150".to_string());
    profile.full_name = Some(full_name.to_string());
    profile.introduction = Some(format!("{} is a mock creator for testing", full_name));
    profile.is_verified = verified;
    profile.language = Some("en".to_string());
    profile.follower_count = followers;
    profile.engagement_rate = Some(engagement_rate);
    profile.average_likes = Some(average_likes);
    profile.location = Some(location.to_string());
    profile.with_metadata("provider", json!(MockProvider::ID))
}

static SEED_PROFILES: Lazy<Vec<ProfileData>> = Lazy::new(|| {
    let mut youtube = seed(
        3,
        "youtube",
        "mockyoutube",
        "Mock YouTube Creator",
        true,
        100_000,
        0.07,
        5000.0,
        "London, UK",
    );
    youtube.subscriber_count = Some(100_000);
    youtube.average_views = Some(25_000.0);
    youtube.account_type = Some("CREATOR".to_string());

    let mut first = seed(
        1,
        "instagram",
        "mockuser1",
        "Mock User One",
        true,
        10_000,
        0.05,
        500.0,
        "New York, USA",
    );
    first.account_type = Some("PERSONAL".to_string());
    first.contact_details = vec![json!({ "type": "email", "value": "mock1@example.com" })];

    let mut second = seed(
        2,
        "instagram",
        "mockuser2",
        "Mock User Two",
        false,
        50_000,
        0.03,
        1500.0,
        "Los Angeles, USA",
    );
    second.account_type = Some("BUSINESS".to_string());

    vec![
        first,
        second,
        youtube,
        seed(
            4,
            "instagram",
            "mockchef",
            "Mock Chef",
            true,
            75_000,
            0.02,
            900.0,
            "Lisbon, PT",
        ),
        seed(
            5,
            "instagram",
            "mocktraveller",
            "Mock Traveller",
            true,
            32_000,
            0.09,
            2800.0,
            "Sydney, AU",
        ),
    ]
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MockPage {
    data: Vec<ProfileData>,
    total_count: u64,
    next_page_token: Option<String>,
}

/// In-memory provider for tests and demos
pub struct MockProvider {
    enabled: bool,
    priority: i32,
    latency: Duration,
}

impl MockProvider {
    pub const ID: &'static str = "mock";

    pub fn new() -> Self {
        Self {
            enabled: true,
            priority: 10,
            latency: Duration::ZERO,
        }
    }

    /// Build from provider settings: `latencyMs` simulates network delay
    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut provider = Self::new();
        if let Some(ms) = setting_u64(&config.settings, "latencyMs") {
            provider.latency = Duration::from_millis(ms);
        }
        provider
    }

    /// The fixed seed list this provider searches
    pub fn seed() -> &'static [ProfileData] {
        &SEED_PROFILES
    }

    fn sort_key(profile: &ProfileData, field: SortField) -> f64 {
        match field {
            SortField::FollowerCount => profile.follower_count as f64,
            SortField::EngagementRate => profile.engagement_rate.unwrap_or(0.0),
            SortField::AverageLikes => profile.average_likes.unwrap_or(0.0),
        }
    }

    fn run_query(query: &SearchQuery) -> Value {
        let username = query.username.as_deref().map(str::to_lowercase);

        let mut matches: Vec<&ProfileData> = SEED_PROFILES
            .iter()
            .filter(|p| {
                query
                    .platform
                    .as_deref()
                    .map_or(true, |platform| p.platform.eq_ignore_ascii_case(platform))
            })
            .filter(|p| {
                username.as_deref().map_or(true, |needle| {
                    p.platform_username.to_lowercase().contains(needle)
                        || p
                            .full_name
                            .as_deref()
                            .map_or(false, |name| name.to_lowercase().contains(needle))
                })
            })
            .filter(|p| query.is_verified.map_or(true, |v| p.is_verified == v))
            .collect();

        if let Some(ref sort_by) = query.sort_by {
            let field = sort_by.sort_field();
            matches.sort_by(|a, b| {
                let ordering = Self::sort_key(a, field)
                    .partial_cmp(&Self::sort_key(b, field))
                    .unwrap_or(Ordering::Equal);
                match sort_by.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        let offset = query.offset.unwrap_or(0) as usize;
        // zero means "unset", not an empty page
        let limit = query
            .limit
            .filter(|l| *l > 0)
            .map_or(DEFAULT_LIMIT, |l| l as usize);
        let total = matches.len();
        let page: Vec<&ProfileData> = matches.into_iter().skip(offset).take(limit).collect();
        let next_page_token = (offset + limit < total).then(|| format!("page-{}", offset + limit));

        json!({
            "data": page,
            "totalCount": total,
            "nextPageToken": next_page_token,
        })
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Mock Data Provider"
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

    /// The seed covers instagram and youtube only
    fn can_handle(&self, query: &SearchQuery) -> bool {
        query.platform.is_none()
            || query.targets_platform("instagram")
            || query.targets_platform("youtube")
    }

    /// The native request is the normalized query itself
    fn translate(&self, query: &SearchQuery) -> Result<ProviderRequest, ProviderError> {
        let body =
            serde_json::to_value(query).map_err(|e| ProviderError::InvalidQuery(e.to_string()))?;
        Ok(ProviderRequest::post("memory://mock").json(body))
    }

    async fn execute(&self, request: ProviderRequest) -> Result<Value, ProviderError> {
        let body = request
            .body
            .ok_or_else(|| ProviderError::InvalidQuery("missing query body".to_string()))?;
        let query: SearchQuery =
            serde_json::from_value(body).map_err(|e| ProviderError::InvalidQuery(e.to_string()))?;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        Ok(Self::run_query(&query))
    }

    fn normalize(&self, raw: Value) -> Result<SearchResult, ProviderError> {
        let page: MockPage = serde_json::from_value(raw)?;
        Ok(SearchResult {
            total_count: Some(page.total_count),
            next_page_token: page.next_page_token,
            ..SearchResult::new(Self::ID, page.data)
        })
    }
}
