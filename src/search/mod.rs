//! Search orchestration module
//!
//! The aggregator fans a query out to providers under a strategy and merges
//! what comes back; the service owns the aggregator and keeps it in sync
//! with configuration.

mod aggregator;
mod service;

pub use aggregator::{
    AggregationStrategy, AggregatorConfig, AggregatorConfigUpdate, ParseStrategyError,
    SearchAggregator, LAST_RESORT_PROVIDER,
};
pub use service::SearchService;
