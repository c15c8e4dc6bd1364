//! Result container for merging and deduplicating profiles from multiple providers

use super::types::*;
use std::collections::HashMap;

/// Accumulates profiles across providers, keeping one entry per creator.
///
/// Insertion order is preserved: the first provider to report a creator fixes
/// its position, even when a later duplicate replaces its data.
#[derive(Debug, Default)]
pub struct ProfileContainer {
    profiles: Vec<ProfileData>,
    /// dedup key -> index into `profiles`
    index: HashMap<String, usize>,
    errors: ProviderErrors,
}

impl ProfileContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a profile, replacing an existing duplicate only if this one is strictly richer
    pub fn add_profile(&mut self, profile: ProfileData) {
        let key = profile.dedup_key();

        match self.index.get(&key) {
            Some(&pos) => {
                let existing = &mut self.profiles[pos];
                if profile.populated_fields() > existing.populated_fields() {
                    *existing = profile;
                }
            }
            None => {
                self.index.insert(key, self.profiles.len());
                self.profiles.push(profile);
            }
        }
    }

    /// Merge one provider's result: its profiles and, if present, its error
    pub fn add_result(&mut self, result: SearchResult) {
        if let Some(error) = result.error {
            self.errors.insert(result.provider, error);
        }
        for profile in result.profiles {
            self.add_profile(profile);
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn errors(&self) -> &ProviderErrors {
        &self.errors
    }

    /// Build the combined result attributed to `provider`
    pub fn into_result(self, provider: &str) -> SearchResult {
        let error = if self.errors.is_empty() {
            None
        } else {
            let details = serde_json::to_value(&self.errors).unwrap_or_default();
            Some(ResultError::new("Some providers encountered errors").with_details(details))
        };

        let total = self.profiles.len() as u64;
        SearchResult {
            total_count: Some(total),
            error,
            ..SearchResult::new(provider, self.profiles)
        }
    }
}
