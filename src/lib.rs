//! creator-search: multi-provider creator discovery search
//!
//! Issues one normalized query to several discovery providers, normalizes
//! their answers into a single profile schema and combines them under a
//! selectable aggregation strategy with per-provider timeouts and error
//! isolation.

pub mod config;
pub mod metrics;
pub mod network;
pub mod providers;
pub mod query;
pub mod results;
pub mod search;

pub use config::{SearchConfig, Settings};
pub use providers::{Provider, ProviderFactory};
pub use query::SearchQuery;
pub use results::{ProfileData, SearchResult};
pub use search::{AggregationStrategy, SearchAggregator, SearchService};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
