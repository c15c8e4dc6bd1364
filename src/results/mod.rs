//! Normalized profile and result types
//!
//! Every provider converts its upstream payload into these shapes, which is
//! what lets the aggregator merge output from unrelated APIs.

mod container;
mod types;

pub use container::ProfileContainer;
pub use types::*;
