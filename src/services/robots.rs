// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! robots.txt policy gate.
//!
//! Only the `User-agent: *` group is consulted. Any matching `Allow` wins over
//! every `Disallow`, regardless of pattern length or order. Fetch failures
//! never block a request.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use texting_robots::get_robots_url;
use thiserror::Error;
use url::Url;

pub const ROBOTS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RobotsFetchError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("status {0}")]
    Status(u16),
}

/// Retrieves the raw robots document for a site
#[async_trait]
pub trait RobotsSource: Send + Sync {
    async fn fetch(&self, robots_url: &str) -> Result<String, RobotsFetchError>;
}

/// Fetches robots.txt over HTTP with a short timeout
pub struct HttpRobotsSource {
    client: reqwest::Client,
}

impl HttpRobotsSource {
    pub fn new(user_agent: &str) -> Result<Self, RobotsFetchError> {
        let client = reqwest::Client::builder()
            .timeout(ROBOTS_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .map_err(|e| RobotsFetchError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RobotsSource for HttpRobotsSource {
    async fn fetch(&self, robots_url: &str) -> Result<String, RobotsFetchError> {
        let response = self
            .client
            .get(robots_url)
            .send()
            .await
            .map_err(|e| RobotsFetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RobotsFetchError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| RobotsFetchError::Request(e.to_string()))
    }
}

#[derive(Debug, Clone)]
struct PathPattern {
    raw: String,
    regex: Regex,
}

impl PathPattern {
    fn new(raw: &str) -> Option<Self> {
        let (body, anchored) = match raw.strip_suffix('$') {
            Some(body) => (body, true),
            None => (raw, false),
        };
        let translated = body
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let source = if anchored {
            format!("^{}$", translated)
        } else {
            format!("^{}", translated)
        };
        Regex::new(&source).ok().map(|regex| Self {
            raw: raw.to_string(),
            regex,
        })
    }

    fn matches(&self, target: &str) -> bool {
        self.regex.is_match(target)
    }
}

/// Allow/Disallow patterns of the wildcard agent group, in file order
#[derive(Debug, Clone, Default)]
pub struct RobotsRuleSet {
    allow: Vec<PathPattern>,
    disallow: Vec<PathPattern>,
}

impl RobotsRuleSet {
    pub fn parse(text: &str) -> Self {
        let mut rules = RobotsRuleSet::default();
        let mut group_agents: Vec<String> = Vec::new();
        let mut group_has_rules = false;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group
                    if group_has_rules {
                        group_agents.clear();
                        group_has_rules = false;
                    }
                    group_agents.push(value.to_ascii_lowercase());
                }
                "allow" | "disallow" => {
                    group_has_rules = true;
                    if value.is_empty() || !group_agents.iter().any(|agent| agent == "*") {
                        continue;
                    }
                    if let Some(pattern) = PathPattern::new(value) {
                        if key == "allow" {
                            rules.allow.push(pattern);
                        } else {
                            rules.disallow.push(pattern);
                        }
                    }
                }
                _ => {
                    if !group_agents.is_empty() {
                        group_has_rules = true;
                    }
                }
            }
        }

        rules
    }

    pub fn disallow_patterns(&self) -> impl Iterator<Item = &str> {
        self.disallow.iter().map(|p| p.raw.as_str())
    }

    /// `target` is the URL path plus `?query` when present
    pub fn is_allowed(&self, target: &str) -> bool {
        if self.allow.iter().any(|p| p.matches(target)) {
            return true;
        }
        !self.disallow.iter().any(|p| p.matches(target))
    }
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[derive(Clone)]
pub struct RobotsGate {
    source: Arc<dyn RobotsSource>,
}

impl RobotsGate {
    pub fn new(source: Arc<dyn RobotsSource>) -> Self {
        Self { source }
    }

    /// Rules are fetched fresh on every call. Any failure means allowed.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let robots_url = match get_robots_url(url.as_str()) {
            Ok(robots_url) => robots_url,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Cannot derive robots.txt url, allowing");
                return true;
            }
        };

        let text = match self.source.fetch(&robots_url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(robots_url = %robots_url, error = %e, "robots.txt unavailable, allowing");
                return true;
            }
        };

        let rules = RobotsRuleSet::parse(&text);
        let allowed = rules.is_allowed(&path_and_query(url));
        if !allowed {
            let disallow: Vec<&str> = rules.disallow_patterns().collect();
            tracing::info!(url = %url, ?disallow, "Blocked by robots.txt");
        }
        allowed
    }
}
