// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Error types shared by the fetch pipeline.

use thiserror::Error;

/// Caller-visible failures of the fetch orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Malformed or non-http(s) URL. Nothing was fetched.
    #[error("invalid url: {0}")]
    InvalidInput(String),

    /// robots.txt explicitly disallows the URL. Nothing was fetched.
    #[error("disallowed by robots.txt: {0}")]
    RobotsBlocked(String),

    /// Invalid CSS selector passed to scrape.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// The rendered page has no element matching the selector.
    #[error("no element matches selector '{0}'")]
    NotFound(String),

    /// Both the local renderer and the provider failed.
    #[error("{local} | provider: {provider}")]
    Exhausted { local: String, provider: String },

    /// Screenshot or PDF capture failed.
    #[error("capture failed: {0}")]
    Capture(String),
}

/// All local attempts were used up without a successful render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("local fetch failed after {attempts} attempt(s): {last_reason}")]
pub struct LocalFetchFailed {
    pub attempts: u32,
    pub last_reason: String,
}

/// Renderer capability failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    /// The browser or page went away; further calls on the session are pointless.
    #[error("browser session closed: {0}")]
    SessionClosed(String),

    #[error("capture failed: {0}")]
    Capture(String),
}

impl RenderError {
    /// Whether the session can still be used for another attempt
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RenderError::LaunchFailed(_) | RenderError::SessionClosed(_)
        )
    }
}

impl From<chromiumoxide::error::CdpError> for RenderError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        let message = err.to_string();
        if message.contains("AlreadyClosed") || message.contains("ConnectionClosed") {
            RenderError::SessionClosed(message)
        } else {
            RenderError::Cdp(message)
        }
    }
}

/// Render provider failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// No API key configured. Not retryable and not a network problem.
    #[error("provider not configured: PROVIDER_API_KEY is not set")]
    NotConfigured,

    #[error("request failed: {0}")]
    Request(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
}
