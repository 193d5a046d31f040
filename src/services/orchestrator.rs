// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Top-level fetch policy: robots gate, local rendering, then provider fallback.

use crate::error::FetchError;
use crate::models::fetch::{FetchRequest, FetchSource, FetchedPage, ScrapeData, ScrapeResponse};
use crate::services::local::{CaptureKind, LocalFetchStrategy};
use crate::services::provider::RenderProvider;
use crate::services::robots::RobotsGate;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

pub struct Fetcher {
    /// `None` when robots.txt is not consulted
    robots: Option<RobotsGate>,
    local: LocalFetchStrategy,
    provider: Arc<dyn RenderProvider>,
}

impl Fetcher {
    pub fn new(
        robots: Option<RobotsGate>,
        local: LocalFetchStrategy,
        provider: Arc<dyn RenderProvider>,
    ) -> Self {
        Self {
            robots,
            local,
            provider,
        }
    }

    /// Fetch fully rendered HTML for `raw_url`
    pub async fn fetch(&self, raw_url: &str) -> Result<FetchedPage, FetchError> {
        let request = FetchRequest::parse(raw_url, false)?;
        let span = tracing::info_span!("fetch", request_id = %Uuid::now_v7(), url = %request.url());
        self.fetch_request(&request).instrument(span).await
    }

    async fn fetch_request(&self, request: &FetchRequest) -> Result<FetchedPage, FetchError> {
        self.check_robots(request).await?;
        let url = request.url();

        let local_error = match self.local.fetch(url).await {
            Ok(html) => {
                return Ok(FetchedPage {
                    source: FetchSource::Local,
                    url: url.to_string(),
                    html,
                })
            }
            Err(e) => e,
        };

        tracing::warn!(reason = %local_error, "Local rendering exhausted, falling back to provider");

        match self.provider.fetch(url).await {
            Ok(html) => {
                tracing::info!(source = %FetchSource::Provider, bytes = html.len(), "Provider render succeeded");
                Ok(FetchedPage {
                    source: FetchSource::Provider,
                    url: url.to_string(),
                    html,
                })
            }
            Err(provider_error) => {
                tracing::error!(
                    local = %local_error,
                    provider = %provider_error,
                    "Fetch failed on every path"
                );
                Err(FetchError::Exhausted {
                    local: local_error.to_string(),
                    provider: provider_error.to_string(),
                })
            }
        }
    }

    /// Fetch `raw_url` and extract trimmed text of elements matching `selector`
    pub async fn scrape(
        &self,
        raw_url: &str,
        selector: &str,
        all: bool,
    ) -> Result<ScrapeResponse, FetchError> {
        let request = FetchRequest::parse(raw_url, false)?;
        parse_selector(selector)?;

        let span = tracing::info_span!("scrape", request_id = %Uuid::now_v7(), url = %request.url(), selector);
        let page = self.fetch_request(&request).instrument(span).await?;
        let data = extract_text(&page.html, selector, all)?;

        Ok(ScrapeResponse {
            url: page.url,
            selector: selector.to_string(),
            data,
        })
    }

    /// PNG of the rendered page. Local rendering only.
    pub async fn screenshot(&self, raw_url: &str, full_page: bool) -> Result<Vec<u8>, FetchError> {
        let request = FetchRequest::parse(raw_url, full_page)?;
        let kind = CaptureKind::Screenshot {
            full_page: request.want_full_page(),
        };
        let span = tracing::info_span!("screenshot", request_id = %Uuid::now_v7(), url = %request.url(), full_page);
        self.capture(&request, kind).instrument(span).await
    }

    /// A4 PDF of the rendered page. Local rendering only.
    pub async fn pdf(&self, raw_url: &str) -> Result<Vec<u8>, FetchError> {
        let request = FetchRequest::parse(raw_url, false)?;
        let span = tracing::info_span!("pdf", request_id = %Uuid::now_v7(), url = %request.url());
        self.capture(&request, CaptureKind::Pdf).instrument(span).await
    }

    async fn capture(&self, request: &FetchRequest, kind: CaptureKind) -> Result<Vec<u8>, FetchError> {
        self.check_robots(request).await?;
        let bytes = self
            .local
            .capture(request.url(), kind)
            .await
            .map_err(|e| FetchError::Capture(e.to_string()))?;
        tracing::info!(bytes = bytes.len(), "Capture succeeded");
        Ok(bytes)
    }

    async fn check_robots(&self, request: &FetchRequest) -> Result<(), FetchError> {
        match &self.robots {
            Some(gate) if !gate.is_allowed(request.url()).await => {
                Err(FetchError::RobotsBlocked(request.url().to_string()))
            }
            _ => Ok(()),
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector).map_err(|e| FetchError::InvalidSelector(format!("'{}': {}", selector, e)))
}

/// Trimmed `textContent` of the first match, or of every match when `all` is set
pub fn extract_text(html: &str, selector: &str, all: bool) -> Result<ScrapeData, FetchError> {
    let selector_parsed = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let mut matches = document
        .select(&selector_parsed)
        .map(|element| element.text().collect::<String>().trim().to_string());

    if all {
        Ok(ScrapeData::All(matches.collect()))
    } else {
        matches
            .next()
            .map(ScrapeData::One)
            .ok_or_else(|| FetchError::NotFound(selector.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <h1> Title </h1>
        <ul><li>one</li><li> two </li></ul>
    </body></html>"#;

    #[test]
    fn test_extract_first_match() {
        assert_eq!(
            extract_text(PAGE, "h1", false).unwrap(),
            ScrapeData::One("Title".to_string())
        );
    }

    #[test]
    fn test_extract_all_matches() {
        assert_eq!(
            extract_text(PAGE, "li", true).unwrap(),
            ScrapeData::All(vec!["one".to_string(), "two".to_string()])
        );
    }

    #[test]
    fn test_extract_missing_element() {
        assert_eq!(
            extract_text(PAGE, "table", false).unwrap_err(),
            FetchError::NotFound("table".to_string())
        );
        assert_eq!(
            extract_text(PAGE, "table", true).unwrap(),
            ScrapeData::All(Vec::new())
        );
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(
            extract_text(PAGE, "li[", false),
            Err(FetchError::InvalidSelector(_))
        ));
    }
}
