//! Impulze Social IQ discovery provider
//!
//! Flat JSON filter body, authenticated with an access token header.

use super::factory::{base_url_setting, setting_str};
use super::traits::*;
use crate::config::ProviderConfig;
use crate::network::HttpClient;
use crate::query::{SearchQuery, SortField, SortOrder};
use crate::results::{ProfileData, SearchResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::debug;

const BASE_URL: &str = "https://apigw.impulze.ai/api/v1/customer/discoverProfiles";
const ORIGIN: &str = "https://socialiq.impulze.ai";

/// HTTP status Impulze uses for exhausted quotas
const STATUS_LOCKED: u16 = 423;

/// Impulze discovery provider
pub struct ImpulzeProvider {
    base_url: String,
    access_token: String,
    enabled: bool,
    priority: i32,
    client: HttpClient,
}

#[derive(Debug, Serialize)]
struct SortSpec {
    field: &'static str,
    order: &'static str,
}

/// Request body of the discoverProfiles endpoint
#[derive(Debug, Serialize)]
struct DiscoverRequest<'a> {
    platform: &'a str,
    sort_by: SortSpec,
    has_contact_details: bool,
    is_verified: bool,
    has_sponsored_posts: bool,
    include_business_accounts: bool,
    offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    creator_locations: Option<&'a BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    creator_language: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(rename = "searchField", skip_serializing_if = "Option::is_none")]
    search_field: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverResponse {
    data: Option<Vec<DiscoverProfile>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkPlatform {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DiscoverProfile {
    work_platform: Option<WorkPlatform>,
    platform_username: Option<String>,
    external_id: Option<String>,
    url: Option<String>,
    image_url: Option<String>,
    full_name: Option<String>,
    introduction: Option<String>,
    is_verified: Option<bool>,
    platform_account_type: Option<String>,
    gender: Option<String>,
    age_group: Option<String>,
    language: Option<String>,
    follower_count: Option<f64>,
    subscriber_count: Option<f64>,
    content_count: Option<f64>,
    engagement_rate: Option<f64>,
    average_likes: Option<f64>,
    average_views: Option<f64>,
    creator_location: Option<String>,
    contact_details: Option<Vec<Value>>,
    filter_match: Option<Value>,
    livestream_metrics: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    name: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ImpulzeProvider {
    pub const ID: &'static str = "impulze";

    pub fn new(access_token: impl Into<String>, client: HttpClient) -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            access_token: access_token.into(),
            enabled: true,
            priority: 1,
            client,
        }
    }

    /// Build from provider settings: `accessToken` (required), `baseUrl` (optional)
    pub fn from_config(config: &ProviderConfig, client: HttpClient) -> Result<Self, ProviderError> {
        let token = setting_str(&config.settings, "accessToken")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ProviderError::Config("impulze requires an accessToken setting".into())
            })?;

        let mut provider = Self::new(token, client);
        if let Some(url) = base_url_setting(&config.settings)? {
            provider.base_url = url;
        }
        debug!("ImpulzeProvider initialized with token length: {}", token.len());
        Ok(provider)
    }

    fn map_sort_field(field: SortField) -> &'static str {
        match field {
            SortField::AverageLikes => "AVERAGE_LIKES",
            SortField::EngagementRate => "ENGAGEMENT_RATE",
            SortField::FollowerCount => "FOLLOWER_COUNT",
        }
    }

    fn error_from_response(response: &ProviderResponse) -> ProviderError {
        let body: ErrorBody = serde_json::from_str(&response.text).unwrap_or_default();

        if response.status == STATUS_LOCKED
            || response.is_rate_limited()
            || body.name.as_deref() == Some("AccessLimited")
        {
            return ProviderError::AccessLimited(
                "You've reached your API usage limit. Please try again later or upgrade your plan."
                    .to_string(),
            );
        }

        ProviderError::Http {
            status: response.status,
            body: body.message.or(body.error).unwrap_or_else(|| response.text.clone()),
        }
    }

    fn to_profile(item: DiscoverProfile) -> Option<ProfileData> {
        let username = item.platform_username?;
        let platform = item
            .work_platform
            .and_then(|p| p.name)
            .map(|name| name.to_lowercase())
            .unwrap_or_else(|| "instagram".to_string());
        let id = item
            .external_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", Self::ID, username));

        let mut profile = ProfileData::new(id, platform, username);
        profile.external_id = item.external_id;
        profile.url = item.url;
        profile.image_url = item.image_url;
        profile.full_name = item.full_name;
        profile.introduction = item.introduction;
        profile.is_verified = item.is_verified.unwrap_or(false);
        profile.account_type = item.platform_account_type;
        profile.gender = item.gender;
        profile.age_group = item.age_group;
        profile.language = item.language;
        profile.follower_count = count(item.follower_count).unwrap_or(0);
        profile.subscriber_count = count(item.subscriber_count);
        profile.content_count = count(item.content_count);
        profile.engagement_rate = item.engagement_rate;
        profile.average_likes = item.average_likes;
        profile.average_views = item.average_views;
        profile.location = item.creator_location;
        profile.contact_details = item.contact_details.unwrap_or_default();

        let profile = profile
            .with_metadata("filterMatch", item.filter_match.unwrap_or(Value::Null))
            .with_metadata("livestreamMetrics", item.livestream_metrics.unwrap_or(Value::Null))
            .with_metadata("provider", json!(Self::ID));

        Some(profile.sanitized())
    }
}

/// Upstream counts arrive as JSON numbers that may be floats
fn count(value: Option<f64>) -> Option<u64> {
    value.filter(|v| v.is_finite()).map(|v| v.max(0.0).round() as u64)
}

#[async_trait]
impl Provider for ImpulzeProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Impulze Social IQ"
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

    /// Impulze is an Instagram index, so it also answers queries addressed to "instagram"
    fn can_handle(&self, query: &SearchQuery) -> bool {
        platform_matches(query, Self::ID) || query.targets_platform("instagram")
    }

    fn translate(&self, query: &SearchQuery) -> Result<ProviderRequest, ProviderError> {
        let sort_by = SortSpec {
            field: Self::map_sort_field(
                query
                    .sort_by
                    .as_ref()
                    .map(|s| s.sort_field())
                    .unwrap_or_default(),
            ),
            order: query
                .sort_by
                .as_ref()
                .map(|s| s.order)
                .unwrap_or(SortOrder::Descending)
                .as_str(),
        };

        let body = DiscoverRequest {
            platform: query.platform.as_deref().unwrap_or("instagram"),
            sort_by,
            has_contact_details: query.has_contact_details.unwrap_or(false),
            is_verified: query.is_verified.unwrap_or(false),
            has_sponsored_posts: query.has_sponsored_posts.unwrap_or(false),
            include_business_accounts: query.include_business_accounts.unwrap_or(false),
            offset: query.offset.unwrap_or(0),
            creator_locations: Some(&query.creator_locations).filter(|l| !l.is_empty()),
            creator_language: query.creator_language.as_deref(),
            username: query.username.as_deref(),
            search_field: query.search_field.as_deref(),
        };

        let body = serde_json::to_value(&body)
            .map_err(|e| ProviderError::InvalidQuery(e.to_string()))?;
        debug!("Impulze API parameters: {}", body);

        Ok(ProviderRequest::post(&self.base_url)
            .header("content-type", "application/json")
            .header("origin", ORIGIN)
            .header("referer", format!("{}/", ORIGIN))
            .header("x-access-token", &self.access_token)
            .json(body))
    }

    async fn execute(&self, request: ProviderRequest) -> Result<Value, ProviderError> {
        let response = self.client.execute(request).await?;

        if !response.is_success() {
            return Err(Self::error_from_response(&response));
        }

        let data = response.json()?;
        debug!(
            "Impulze API response received with {} profiles",
            data.get("data").and_then(|d| d.as_array()).map_or(0, |d| d.len())
        );
        Ok(data)
    }

    fn normalize(&self, raw: Value) -> Result<SearchResult, ProviderError> {
        let response: DiscoverResponse = serde_json::from_value(raw.clone())?;
        let items = response
            .data
            .ok_or_else(|| ProviderError::InvalidResponse("missing data array".to_string()))?;

        let profiles: Vec<ProfileData> = items
            .into_iter()
            .filter_map(Self::to_profile)
            .collect();

        Ok(SearchResult {
            total_count: Some(profiles.len() as u64),
            next_page_token: response.next_page_token,
            raw_response: Some(raw),
            ..SearchResult::new(Self::ID, profiles)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::codes;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> ImpulzeProvider {
        let config = ProviderConfig::new("impulze", 1)
            .with_setting("accessToken", json!("test-token"))
            .with_setting("baseUrl", json!(format!("{}/discover", base_url)));
        ImpulzeProvider::from_config(&config, HttpClient::new().unwrap()).unwrap()
    }

    fn sample_payload() -> Value {
        json!({
            "message": "ok",
            "data": [{
                "work_platform": { "id": "9bb8913b", "name": "Instagram" },
                "platform_username": "travelwithkate",
                "external_id": "1784",
                "url": "https://www.instagram.com/travelwithkate",
                "image_url": "https://cdn.example.com/kate.jpg",
                "full_name": "Kate",
                "is_verified": true,
                "platform_account_type": "CREATOR",
                "follower_count": 254000,
                "engagement_rate": 0.031,
                "average_likes": 7800,
                "creator_location": "Lisbon",
                "filter_match": { "follower_count": true },
                "contact_details": [{ "type": "email", "value": "kate@example.com" }]
            }],
            "nextPageToken": "abc"
        })
    }

    #[test]
    fn test_requires_access_token() {
        let config = ProviderConfig::new("impulze", 1);
        let result = ImpulzeProvider::from_config(&config, HttpClient::new().unwrap());
        assert!(matches!(result, Err(ProviderError::Config(_))));
    }

    #[test]
    fn test_can_handle_instagram() {
        let impulze = provider("https://example.com");
        assert!(impulze.can_handle(&SearchQuery::new()));
        assert!(impulze.can_handle(&SearchQuery::new().with_platform("Instagram")));
        assert!(impulze.can_handle(&SearchQuery::new().with_platform("impulze")));
        assert!(!impulze.can_handle(&SearchQuery::new().with_platform("youtube")));
    }

    #[test]
    fn test_translate_defaults() {
        let impulze = provider("https://example.com");
        let request = impulze.translate(&SearchQuery::new()).unwrap();
        let body = request.body.unwrap();

        assert_eq!(body["platform"], "instagram");
        assert_eq!(body["sort_by"]["field"], "FOLLOWER_COUNT");
        assert_eq!(body["sort_by"]["order"], "DESCENDING");
        assert_eq!(body["is_verified"], false);
        assert_eq!(body["offset"], 0);
        assert!(body.get("creator_locations").is_none());
        assert_eq!(request.headers["x-access-token"], "test-token");
    }

    #[test]
    fn test_translate_filters() {
        let impulze = provider("https://example.com");
        let query = SearchQuery::new()
            .sorted_by("engagement_rate", SortOrder::Ascending)
            .verified(true)
            .with_location("PT")
            .with_language("pt")
            .with_username("kate")
            .with_offset(40);
        let body = impulze.translate(&query).unwrap().body.unwrap();

        assert_eq!(body["sort_by"]["field"], "ENGAGEMENT_RATE");
        assert_eq!(body["sort_by"]["order"], "ASCENDING");
        assert_eq!(body["is_verified"], true);
        assert_eq!(body["creator_locations"], json!(["PT"]));
        assert_eq!(body["creator_language"], "pt");
        assert_eq!(body["username"], "kate");
        assert_eq!(body["offset"], 40);
    }

    #[test]
    fn test_normalize_maps_fields() {
        let impulze = provider("https://example.com");
        let result = impulze.normalize(sample_payload()).unwrap();

        assert_eq!(result.profiles.len(), 1);
        assert_eq!(result.next_page_token.as_deref(), Some("abc"));
        let profile = &result.profiles[0];
        assert_eq!(profile.id, "1784");
        assert_eq!(profile.platform, "instagram");
        assert_eq!(profile.platform_username, "travelwithkate");
        assert_eq!(profile.follower_count, 254_000);
        assert_eq!(profile.location.as_deref(), Some("Lisbon"));
        assert_eq!(profile.metadata["filterMatch"]["follower_count"], true);
    }

    #[test]
    fn test_normalize_rejects_missing_data() {
        let impulze = provider("https://example.com");
        let result = impulze.normalize(json!({ "message": "nope" }));
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_search_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/discover"))
            .and(header("x-access-token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
            .mount(&server)
            .await;

        let impulze = provider(&server.uri());
        let result = impulze
            .search(&SearchQuery::new().with_platform("instagram"))
            .await;

        assert!(result.error.is_none());
        assert_eq!(result.provider, "impulze");
        assert_eq!(result.profiles[0].platform_username, "travelwithkate");
        assert_eq!(result.profiles[0].follower_count, 254_000);
    }

    #[tokio::test]
    async fn test_access_limited_is_distinguishable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(423).set_body_json(json!({ "name": "AccessLimited" })),
            )
            .mount(&server)
            .await;

        let result = provider(&server.uri()).search(&SearchQuery::new()).await;

        assert!(result.profiles.is_empty());
        assert_eq!(result.error_code(), Some(codes::ACCESS_LIMITED));
    }

    #[tokio::test]
    async fn test_http_error_never_escapes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "message": "internal" })),
            )
            .mount(&server)
            .await;

        let result = provider(&server.uri()).search(&SearchQuery::new()).await;

        assert_eq!(result.provider, "impulze");
        assert_eq!(result.error_code(), Some(codes::HTTP_ERROR));
        assert!(result.error.unwrap().message.contains("internal"));
    }
}
