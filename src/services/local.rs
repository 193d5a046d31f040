// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Local fetch strategy: one renderer session per call, walked through a
//! wait-strategy × attempt matrix until a page renders without a challenge.

use crate::error::{LocalFetchFailed, RenderError};
use crate::models::fetch::{AttemptOutcome, WaitStrategy};
use crate::models::identity::RenderIdentity;
use crate::services::backoff::BackoffPolicy;
use crate::services::challenge::{ChallengeDetector, Verdict};
use crate::services::renderer::{RenderSession, Renderer};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct LocalFetchConfig {
    pub navigation_timeout: Duration,
    /// Best-effort wait for a challenge page to clear by itself
    pub challenge_wait: Duration,
    /// Selector that must exist before the DOM is read
    pub content_marker: String,
    pub content_marker_wait: Duration,
    pub wait_strategies: Vec<WaitStrategy>,
    pub attempts_per_strategy: u32,
    pub backoff: BackoffPolicy,
}

impl Default for LocalFetchConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(45),
            challenge_wait: Duration::from_secs(15),
            content_marker: "body".to_string(),
            content_marker_wait: Duration::from_secs(10),
            wait_strategies: WaitStrategy::SEQUENCE.to_vec(),
            attempts_per_strategy: 2,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl LocalFetchConfig {
    pub fn max_attempts(&self) -> u32 {
        self.wait_strategies.len() as u32 * self.attempts_per_strategy
    }
}

/// Binary captures taken from a single rendered page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Screenshot { full_page: bool },
    Pdf,
}

pub struct LocalFetchStrategy {
    renderer: Arc<dyn Renderer>,
    identity: RenderIdentity,
    detector: ChallengeDetector,
    config: LocalFetchConfig,
}

impl LocalFetchStrategy {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        identity: RenderIdentity,
        detector: ChallengeDetector,
        config: LocalFetchConfig,
    ) -> Self {
        Self {
            renderer,
            identity,
            detector,
            config,
        }
    }

    /// Render `url` and return its HTML. The session opened here is closed
    /// exactly once before returning.
    pub async fn fetch(&self, url: &Url) -> Result<String, LocalFetchFailed> {
        let mut session = self
            .renderer
            .open(&self.identity)
            .await
            .map_err(|e| LocalFetchFailed {
                attempts: 0,
                last_reason: e.to_string(),
            })?;

        let result = self.run_matrix(session.as_mut(), url).await;
        close_session(session.as_mut()).await;
        result
    }

    async fn run_matrix(
        &self,
        session: &mut dyn RenderSession,
        url: &Url,
    ) -> Result<String, LocalFetchFailed> {
        let max_attempts = self.config.max_attempts();
        let mut attempts = 0;
        let mut last_reason = "no attempts configured".to_string();

        for &wait in &self.config.wait_strategies {
            for attempt in 1..=self.config.attempts_per_strategy {
                attempts += 1;
                match self.attempt(session, url, wait).await {
                    AttemptOutcome::Success(html) => {
                        tracing::info!(url = %url, %wait, attempt, bytes = html.len(), "Local render succeeded");
                        return Ok(html);
                    }
                    AttemptOutcome::FatalLocalFailure(reason) => {
                        tracing::warn!(url = %url, %wait, attempt, reason = %reason, "Local render aborted");
                        return Err(LocalFetchFailed {
                            attempts,
                            last_reason: reason,
                        });
                    }
                    AttemptOutcome::Retryable(reason) => {
                        tracing::warn!(url = %url, %wait, attempt, reason = %reason, "Local render attempt failed");
                        last_reason = reason;
                        if attempts < max_attempts {
                            self.config.backoff.wait(attempt).await;
                        }
                    }
                }
            }
        }

        Err(LocalFetchFailed {
            attempts,
            last_reason,
        })
    }

    async fn attempt(
        &self,
        session: &mut dyn RenderSession,
        url: &Url,
        wait: WaitStrategy,
    ) -> AttemptOutcome {
        let response = match session
            .navigate(url, wait, self.config.navigation_timeout)
            .await
        {
            Ok(response) => response,
            Err(e) => return failed(e),
        };

        session
            .wait_for_challenge_clear(&self.detector, self.config.challenge_wait)
            .await;

        if let Err(e) = session
            .wait_for_selector(&self.config.content_marker, self.config.content_marker_wait)
            .await
        {
            tracing::debug!(url = %url, error = %e, "Content marker not found, reading DOM anyway");
        }

        let html = match session.content().await {
            Ok(html) => html,
            Err(e) => return failed(e),
        };

        match self.detector.classify(response.status, &html) {
            Verdict::Success => AttemptOutcome::Success(html),
            Verdict::Retryable(reason) => AttemptOutcome::Retryable(reason),
        }
    }

    /// Render `url` once and capture it as PNG or PDF. Wait strategies are
    /// tried in order until one navigation succeeds.
    pub async fn capture(&self, url: &Url, kind: CaptureKind) -> Result<Vec<u8>, RenderError> {
        let mut session = self.renderer.open(&self.identity).await?;
        let result = self.capture_with(session.as_mut(), url, kind).await;
        close_session(session.as_mut()).await;
        result
    }

    async fn capture_with(
        &self,
        session: &mut dyn RenderSession,
        url: &Url,
        kind: CaptureKind,
    ) -> Result<Vec<u8>, RenderError> {
        let mut last_error = RenderError::NavigationFailed("no wait strategy configured".to_string());
        let mut navigated = false;

        for &wait in &self.config.wait_strategies {
            match session
                .navigate(url, wait, self.config.navigation_timeout)
                .await
            {
                Ok(_) => {
                    navigated = true;
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(url = %url, %wait, error = %e, "Capture navigation failed");
                    last_error = e;
                }
            }
        }
        if !navigated {
            return Err(last_error);
        }

        if !session
            .wait_for_challenge_clear(&self.detector, self.config.challenge_wait)
            .await
        {
            tracing::warn!(url = %url, "Challenge still present, capturing anyway");
        }

        match kind {
            CaptureKind::Screenshot { full_page } => session.screenshot(full_page).await,
            CaptureKind::Pdf => session.pdf().await,
        }
    }
}

fn failed(err: RenderError) -> AttemptOutcome {
    if err.is_fatal() {
        AttemptOutcome::FatalLocalFailure(err.to_string())
    } else {
        AttemptOutcome::Retryable(err.to_string())
    }
}

async fn close_session(session: &mut dyn RenderSession) {
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Failed to close renderer session");
    }
}
