// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Paid rendering API, used only after local rendering is exhausted.

use crate::error::ProviderError;
use crate::models::config::ProviderSettings;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest error body kept in a `ProviderError::Status`
const MAX_ERROR_BODY: usize = 200;

#[async_trait]
pub trait RenderProvider: Send + Sync {
    /// One call, no retries. Returns JavaScript-rendered HTML.
    async fn fetch(&self, url: &Url) -> Result<String, ProviderError>;
}

pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        Self::with_timeout(settings, PROVIDER_TIMEOUT)
    }

    pub fn with_timeout(settings: &ProviderSettings, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            timeout,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn request_url(&self, api_key: &str, target: &Url) -> Result<Url, ProviderError> {
        let mut request_url = Url::parse(&self.endpoint)
            .map_err(|e| ProviderError::Request(format!("invalid provider endpoint: {}", e)))?;
        request_url
            .query_pairs_mut()
            .append_pair("api_key", api_key)
            .append_pair("url", target.as_str())
            .append_pair("render_js", "true");
        Ok(request_url)
    }
}

#[async_trait]
impl RenderProvider for HttpProvider {
    async fn fetch(&self, url: &Url) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::NotConfigured)?;
        let request_url = self.request_url(api_key, url)?;

        tracing::info!(url = %url, "Requesting provider render");

        let response = self
            .client
            .get(request_url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        Ok(body)
    }
}

impl HttpProvider {
    fn classify(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout.as_secs())
        } else {
            // Drop the request URL: it carries the API key
            ProviderError::Request(err.without_url().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn provider(endpoint: &str, api_key: Option<&str>) -> HttpProvider {
        HttpProvider::new(&ProviderSettings {
            endpoint: endpoint.to_string(),
            api_key: api_key.map(String::from),
        })
        .unwrap()
    }

    fn target() -> Url {
        Url::parse("https://example.com/page?a=1").unwrap()
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let provider = provider("http://127.0.0.1:1/api/v1/", None);
        assert!(!provider.is_configured());
        assert_eq!(
            provider.fetch(&target()).await.unwrap_err(),
            ProviderError::NotConfigured
        );
    }

    #[tokio::test]
    async fn test_fetch_sends_key_url_and_render_flag() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api_key".into(), "secret-key".into()),
                Matcher::UrlEncoded("url".into(), "https://example.com/page?a=1".into()),
                Matcher::UrlEncoded("render_js".into(), "true".into()),
            ]))
            .with_status(200)
            .with_body("<html>rendered</html>")
            .create_async()
            .await;

        let provider = provider(&format!("{}/api/v1/", server.url()), Some("secret-key"));
        let html = provider.fetch(&target()).await.unwrap();

        assert_eq!(html, "<html>rendered</html>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let provider = provider(&format!("{}/api/v1/", server.url()), Some("k"));
        assert_eq!(
            provider.fetch(&target()).await.unwrap_err(),
            ProviderError::Status {
                status: 500,
                body: "upstream exploded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_network_error_hides_api_key() {
        let provider = provider("http://127.0.0.1:1/api/v1/", Some("secret-key"));
        let err = provider.fetch(&target()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Request(_)));
        assert!(!err.to_string().contains("secret-key"));
    }
}
