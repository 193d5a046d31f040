// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use url::Url;

/// A validated request to render one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: Url,
    want_full_page: bool,
}

impl FetchRequest {
    /// Parse and validate a caller-supplied URL.
    /// Only absolute http(s) URLs with a host are accepted.
    pub fn parse(raw: &str, want_full_page: bool) -> Result<Self, FetchError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FetchError::InvalidInput("url is required".to_string()));
        }

        let url = Url::parse(raw)
            .map_err(|e| FetchError::InvalidInput(format!("'{}': {}", truncate(raw), e)))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(FetchError::InvalidInput(format!(
                    "unsupported scheme '{}', only http/https allowed",
                    scheme
                )))
            }
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(FetchError::InvalidInput(format!(
                "'{}' has no host",
                truncate(raw)
            )));
        }

        Ok(Self {
            url,
            want_full_page,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn want_full_page(&self) -> bool {
        self.want_full_page
    }
}

fn truncate(raw: &str) -> String {
    if raw.chars().count() > 100 {
        format!("{}...", raw.chars().take(100).collect::<String>())
    } else {
        raw.to_string()
    }
}

/// How long the renderer waits after navigation before reading the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Wait for the network to go quiet. Slower, more complete DOM.
    NetworkIdle,
    /// Wait for the DOM to be parsed. Cheaper fallback.
    DomContentLoaded,
}

impl WaitStrategy {
    /// Attempt order used by the local fetch strategy
    pub const SEQUENCE: [WaitStrategy; 2] = [WaitStrategy::NetworkIdle, WaitStrategy::DomContentLoaded];
}

impl std::fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitStrategy::NetworkIdle => write!(f, "network_idle"),
            WaitStrategy::DomContentLoaded => write!(f, "dom_content_loaded"),
        }
    }
}

/// Outcome of a single navigation attempt. Exactly one variant is populated,
/// so a failed attempt never carries half-rendered HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(String),
    Retryable(String),
    FatalLocalFailure(String),
}

/// Where the returned HTML came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchSource {
    Local,
    Provider,
}

impl std::fmt::Display for FetchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchSource::Local => write!(f, "local"),
            FetchSource::Provider => write!(f, "provider"),
        }
    }
}

/// Rendered page returned by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub source: FetchSource,
    pub url: String,
    pub html: String,
}

/// Caller-visible fetch result: `{ok, source, url, html}` or `{ok: false, error}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<FetchSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            source: None,
            url: None,
            html: None,
            error: Some(message.into()),
        }
    }
}

impl From<FetchedPage> for FetchResponse {
    fn from(page: FetchedPage) -> Self {
        Self {
            ok: true,
            source: Some(page.source),
            url: Some(page.url),
            html: Some(page.html),
            error: None,
        }
    }
}

impl From<Result<FetchedPage, FetchError>> for FetchResponse {
    fn from(result: Result<FetchedPage, FetchError>) -> Self {
        match result {
            Ok(page) => page.into(),
            Err(e) => FetchResponse::error(e.to_string()),
        }
    }
}

/// Body of `POST /fetch`
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchBody {
    #[serde(default)]
    pub url: String,
}

/// Query of `GET /fetch`
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchQuery {
    #[serde(default)]
    pub url: String,
}

/// Query of `GET /screenshot`
#[derive(Debug, Serialize, Deserialize)]
pub struct ScreenshotQuery {
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "fullPage")]
    pub full_page: Option<String>,
}

impl ScreenshotQuery {
    /// Any non-empty value other than "false"/"0" turns full-page capture on
    pub fn wants_full_page(&self) -> bool {
        flag_is_set(self.full_page.as_deref())
    }
}

/// Query of `GET /scrape`
#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeQuery {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_selector")]
    pub selector: String,
    #[serde(default)]
    pub all: Option<String>,
}

fn default_selector() -> String {
    "body".to_string()
}

impl ScrapeQuery {
    pub fn wants_all(&self) -> bool {
        flag_is_set(self.all.as_deref())
    }
}

/// Text extracted by `GET /scrape`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScrapeData {
    One(String),
    All(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub url: String,
    pub selector: String,
    pub data: ScrapeData,
}

fn flag_is_set(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => false,
        Some(v) => !matches!(v.to_ascii_lowercase().as_str(), "false" | "0" | "no"),
    }
}
