//! HTTP networking module
//!
//! Provides the HTTP client providers use to reach their upstream APIs.

mod client;
mod user_agent;

pub use client::HttpClient;
pub use user_agent::{accept_json, accept_language, DESKTOP_CHROME};
