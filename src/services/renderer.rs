// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Renderer capability: one browser page per session.

use crate::error::RenderError;
use crate::models::fetch::WaitStrategy;
use crate::models::identity::RenderIdentity;
use crate::services::challenge::ChallengeDetector;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

pub const CHALLENGE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Response metadata of the main document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationResponse {
    pub status: u16,
}

/// Opens isolated sessions. Identity is handed to each session explicitly.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn open(&self, identity: &RenderIdentity) -> Result<Box<dyn RenderSession>, RenderError>;
}

#[async_trait]
pub trait RenderSession: Send {
    async fn navigate(
        &mut self,
        url: &Url,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<NavigationResponse, RenderError>;

    /// Text the user would see (`document.body.innerText`)
    async fn visible_text(&mut self) -> Result<String, RenderError>;

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), RenderError>;

    /// Serialized DOM of the current page
    async fn content(&mut self) -> Result<String, RenderError>;

    /// PNG bytes of the viewport, or the whole page when `full_page` is set
    async fn screenshot(&mut self, full_page: bool) -> Result<Vec<u8>, RenderError>;

    async fn pdf(&mut self) -> Result<Vec<u8>, RenderError>;

    /// Release the page and its browser. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), RenderError>;

    /// Poll the visible text until no challenge signature is left or `max_wait`
    /// runs out. Never fails. Returns whether the page looked clear at the end.
    async fn wait_for_challenge_clear(
        &mut self,
        detector: &ChallengeDetector,
        max_wait: Duration,
    ) -> bool {
        let deadline = Instant::now() + max_wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.visible_text()).await {
                Ok(Ok(text)) => match detector.matched_signature(&text) {
                    None => return true,
                    Some(signature) => {
                        tracing::debug!(signature, "Challenge still present");
                    }
                },
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "Cannot read page text while waiting for challenge");
                    return false;
                }
                Err(_) => {
                    tracing::debug!("Reading page text outlasted the challenge wait");
                    return false;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(CHALLENGE_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shows challenge text for the first `challenge_reads` reads
    struct FadingChallenge {
        challenge_reads: usize,
        reads: usize,
        stalled: bool,
    }

    #[async_trait]
    impl RenderSession for FadingChallenge {
        async fn navigate(
            &mut self,
            _url: &Url,
            _wait: WaitStrategy,
            _timeout: Duration,
        ) -> Result<NavigationResponse, RenderError> {
            Ok(NavigationResponse { status: 200 })
        }

        async fn visible_text(&mut self) -> Result<String, RenderError> {
            self.reads += 1;
            if self.stalled {
                std::future::pending::<()>().await;
            }
            if self.reads <= self.challenge_reads {
                Ok("Just a moment...".to_string())
            } else {
                Ok("Welcome".to_string())
            }
        }

        async fn wait_for_selector(&mut self, _selector: &str, _timeout: Duration) -> Result<(), RenderError> {
            Ok(())
        }

        async fn content(&mut self) -> Result<String, RenderError> {
            Ok(String::new())
        }

        async fn screenshot(&mut self, _full_page: bool) -> Result<Vec<u8>, RenderError> {
            Ok(Vec::new())
        }

        async fn pdf(&mut self) -> Result<Vec<u8>, RenderError> {
            Ok(Vec::new())
        }

        async fn close(&mut self) -> Result<(), RenderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_wait_returns_once_challenge_clears() {
        let mut session = FadingChallenge {
            challenge_reads: 1,
            reads: 0,
            stalled: false,
        };
        let cleared = session
            .wait_for_challenge_clear(&ChallengeDetector::default(), Duration::from_secs(5))
            .await;
        assert!(cleared);
        assert_eq!(session.reads, 2);
    }

    #[tokio::test]
    async fn test_wait_gives_up_at_cap() {
        let mut session = FadingChallenge {
            challenge_reads: usize::MAX,
            reads: 0,
            stalled: false,
        };
        let started = std::time::Instant::now();
        let cleared = session
            .wait_for_challenge_clear(&ChallengeDetector::default(), Duration::from_millis(200))
            .await;
        assert!(!cleared);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_text_read_is_cut_at_cap() {
        let mut session = FadingChallenge {
            challenge_reads: 0,
            reads: 0,
            stalled: true,
        };
        let started = Instant::now();
        let cleared = session
            .wait_for_challenge_clear(&ChallengeDetector::default(), Duration::from_secs(15))
            .await;
        assert!(!cleared);
        assert_eq!(session.reads, 1);
        assert!(started.elapsed() <= Duration::from_secs(15));
    }
}
