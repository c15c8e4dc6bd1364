//! Normalized search query
//!
//! A provider-agnostic description of what the caller is looking for.
//! Providers translate it into their own upstream request shape.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "ASCENDING",
            Self::Descending => "DESCENDING",
        }
    }
}

/// Sort fields understood by every provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortField {
    #[default]
    FollowerCount,
    AverageLikes,
    EngagementRate,
}

impl SortField {
    /// Map a caller-supplied field name; anything unrecognized sorts by followers.
    pub fn parse(field: &str) -> Self {
        match field.to_ascii_uppercase().as_str() {
            "AVERAGE_LIKES" => Self::AverageLikes,
            "ENGAGEMENT_RATE" => Self::EngagementRate,
            _ => Self::FollowerCount,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FollowerCount => "FOLLOWER_COUNT",
            Self::AverageLikes => "AVERAGE_LIKES",
            Self::EngagementRate => "ENGAGEMENT_RATE",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sorting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    /// Field name as sent by the caller
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortBy {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    pub fn sort_field(&self) -> SortField {
        SortField::parse(&self.field)
    }
}

/// Provider-agnostic search request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    /// Platform to search on (instagram, youtube, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Which profile field the username text applies to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_contact_details: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_sponsored_posts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_business_accounts: Option<bool>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub creator_locations: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Provider-specific options (e.g. free-text `keywords`)
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub extended_params: HashMap<String, serde_json::Value>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_search_field(mut self, field: impl Into<String>) -> Self {
        self.search_field = Some(field.into());
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(SortBy::new(field, order));
        self
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.is_verified = Some(verified);
        self
    }

    pub fn with_contact_details(mut self, required: bool) -> Self {
        self.has_contact_details = Some(required);
        self
    }

    pub fn with_sponsored_posts(mut self, required: bool) -> Self {
        self.has_sponsored_posts = Some(required);
        self
    }

    pub fn include_business_accounts(mut self, include: bool) -> Self {
        self.include_business_accounts = Some(include);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.creator_locations.insert(location.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.creator_language = Some(language.into());
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extended_params.insert(key.into(), value);
        self
    }

    /// Whether the requested platform (if any) equals `name`, ignoring case
    pub fn targets_platform(&self, name: &str) -> bool {
        self.platform
            .as_deref()
            .map_or(false, |p| p.eq_ignore_ascii_case(name))
    }

    /// Free-text keywords from the extended params, either a string or an array of strings
    pub fn keywords(&self) -> Option<String> {
        match self.extended_params.get("keywords")? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Array(items) if !items.is_empty() => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_field_parse() {
        assert_eq!(SortField::parse("average_likes"), SortField::AverageLikes);
        assert_eq!(SortField::parse("ENGAGEMENT_RATE"), SortField::EngagementRate);
        assert_eq!(SortField::parse("views"), SortField::FollowerCount);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let query: SearchQuery = serde_json::from_value(json!({
            "platform": "instagram",
            "sortBy": { "field": "FOLLOWER_COUNT", "order": "ASCENDING" },
            "isVerified": true,
            "creatorLocations": ["US", "GB"],
            "offset": 20
        }))
        .unwrap();

        assert!(query.targets_platform("Instagram"));
        assert_eq!(query.sort_by.unwrap().order, SortOrder::Ascending);
        assert_eq!(query.is_verified, Some(true));
        assert_eq!(query.creator_locations.len(), 2);
        assert_eq!(query.offset, Some(20));
    }

    #[test]
    fn test_keywords() {
        let query = SearchQuery::new().with_param("keywords", json!(["fitness", "yoga"]));
        assert_eq!(query.keywords().as_deref(), Some("fitness yoga"));

        let query = SearchQuery::new().with_param("keywords", json!(""));
        assert!(query.keywords().is_none());
    }
}
