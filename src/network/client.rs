//! HTTP client for making requests to provider APIs

use super::user_agent::{accept_json, accept_language, DESKTOP_CHROME};
use crate::config::OutgoingSettings;
use crate::providers::{HttpMethod, ProviderRequest, ProviderResponse};
use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// HTTP client wrapper shared by all providers
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs_f64(settings.request_timeout))
            .pool_max_idle_per_host(settings.pool_maxsize)
            .gzip(true)
            .brotli(true);

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref proxy_url) = settings.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            default_timeout: Duration::from_secs_f64(settings.request_timeout),
        })
    }

    /// Execute a provider request.
    ///
    /// A request-level timeout, when set, aborts the underlying transfer.
    pub async fn execute(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, reqwest::Error> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        req_builder = req_builder
            .timeout(timeout)
            .headers(self.build_headers(&request.headers));

        if let Some(ref body) = request.body {
            req_builder = req_builder.json(body);
        }

        let response = req_builder.send().await?;

        Self::parse_response(response).await
    }

    /// Default headers, overridden by the provider's own
    fn build_headers(&self, provider_headers: &HashMap<String, String>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let defaults = [
            ("user-agent".to_string(), DESKTOP_CHROME.to_string()),
            ("accept".to_string(), accept_json().to_string()),
            ("accept-language".to_string(), accept_language("en-GB")),
        ];

        let merged = defaults
            .iter()
            .map(|(k, v)| (k, v))
            .chain(provider_headers.iter());

        for (key, value) in merged {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Skipping invalid header: {}", key),
            }
        }

        headers
    }

    async fn parse_response(response: Response) -> Result<ProviderResponse, reqwest::Error> {
        let status = response.status().as_u16();
        let text = response.text().await?;

        Ok(ProviderResponse { status, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_execute_posts_json_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("x-token", "abc"))
            .and(body_json(json!({ "q": "rust" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let request = ProviderRequest::post(format!("{}/search", server.uri()))
            .header("x-token", "abc")
            .json(json!({ "q": "rust" }));

        let response = client.execute(request).await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.json().unwrap()["ok"], json!(true));
    }
}
