// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Recognizes anti-bot interstitials in rendered pages.

/// HTTP statuses that mean "try again", not "the page is gone"
pub const RETRYABLE_STATUSES: [u16; 3] = [403, 429, 503];

/// Lowercase interstitial phrases and challenge-only element ids. Vendor names
/// are left out: they show up in script URLs of pages that rendered fine.
pub const DEFAULT_SIGNATURES: [&str; 11] = [
    "just a moment",
    "checking your browser",
    "ser humano",
    "verify you are a human",
    "verifying you are human",
    "attention required",
    "cf-browser-verification",
    "cf-challenge",
    "cf-captcha-container",
    "please enable javascript and cookies",
    "captcha challenge",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Retryable(String),
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }
}

#[derive(Debug, Clone)]
pub struct ChallengeDetector {
    signatures: Vec<String>,
}

impl Default for ChallengeDetector {
    fn default() -> Self {
        Self::with_signatures(DEFAULT_SIGNATURES)
    }
}

impl ChallengeDetector {
    pub fn with_signatures<I, S>(signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            signatures: signatures
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// First signature found in `text`, compared case-insensitively
    pub fn matched_signature(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.signatures
            .iter()
            .find(|signature| lower.contains(signature.as_str()))
            .map(String::as_str)
    }

    pub fn classify(&self, status: u16, text: &str) -> Verdict {
        if RETRYABLE_STATUSES.contains(&status) {
            return Verdict::Retryable(format!("status {}", status));
        }

        match self.matched_signature(text) {
            Some(signature) => Verdict::Retryable(format!("challenge detected: '{}'", signature)),
            None => Verdict::Success,
        }
    }
}
