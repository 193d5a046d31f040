// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Test doubles for the renderer, provider, and robots capabilities.

#![allow(dead_code)]

use async_trait::async_trait;
use render_agent::error::{ProviderError, RenderError};
use render_agent::models::fetch::WaitStrategy;
use render_agent::models::identity::RenderIdentity;
use render_agent::services::backoff::BackoffPolicy;
use render_agent::services::challenge::ChallengeDetector;
use render_agent::services::local::{LocalFetchConfig, LocalFetchStrategy};
use render_agent::services::orchestrator::Fetcher;
use render_agent::services::provider::RenderProvider;
use render_agent::services::renderer::{NavigationResponse, RenderSession, Renderer};
use render_agent::services::robots::{RobotsFetchError, RobotsGate, RobotsSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// What every navigation of a scripted session does
#[derive(Debug, Clone)]
pub enum PageScript {
    Render { status: u16, html: String },
    FailNavigation,
    FailLaunch,
}

impl PageScript {
    pub fn ok(html: &str) -> Self {
        PageScript::Render {
            status: 200,
            html: html.to_string(),
        }
    }

    pub fn challenge() -> Self {
        PageScript::Render {
            status: 200,
            html: "<html><title>Just a moment...</title>Checking your browser</html>".to_string(),
        }
    }
}

#[derive(Default)]
pub struct RenderCounters {
    pub opens: AtomicUsize,
    pub navigations: AtomicUsize,
    pub closes: AtomicUsize,
}

impl RenderCounters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct ScriptedRenderer {
    script: PageScript,
    pub counters: Arc<RenderCounters>,
}

impl ScriptedRenderer {
    pub fn new(script: PageScript) -> Self {
        Self {
            script,
            counters: Arc::new(RenderCounters::default()),
        }
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn open(&self, _identity: &RenderIdentity) -> Result<Box<dyn RenderSession>, RenderError> {
        if let PageScript::FailLaunch = self.script {
            return Err(RenderError::LaunchFailed("chromium not found".to_string()));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            counters: self.counters.clone(),
            closed: false,
        }))
    }
}

struct ScriptedSession {
    script: PageScript,
    counters: Arc<RenderCounters>,
    closed: bool,
}

impl ScriptedSession {
    fn html(&self) -> String {
        match &self.script {
            PageScript::Render { html, .. } => html.clone(),
            _ => String::new(),
        }
    }
}

#[async_trait]
impl RenderSession for ScriptedSession {
    async fn navigate(
        &mut self,
        _url: &Url,
        _wait: WaitStrategy,
        _timeout: Duration,
    ) -> Result<NavigationResponse, RenderError> {
        self.counters.navigations.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            PageScript::Render { status, .. } => Ok(NavigationResponse { status: *status }),
            _ => Err(RenderError::NavigationFailed(
                "net::ERR_NAME_NOT_RESOLVED".to_string(),
            )),
        }
    }

    async fn visible_text(&mut self) -> Result<String, RenderError> {
        Ok(self.html())
    }

    async fn wait_for_selector(&mut self, _selector: &str, _timeout: Duration) -> Result<(), RenderError> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        Ok(self.html())
    }

    async fn screenshot(&mut self, full_page: bool) -> Result<Vec<u8>, RenderError> {
        let mut png = b"\x89PNG".to_vec();
        if full_page {
            png.push(b'F');
        }
        Ok(png)
    }

    async fn pdf(&mut self) -> Result<Vec<u8>, RenderError> {
        Ok(b"%PDF-1.7".to_vec())
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        if !self.closed {
            self.closed = true;
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

pub struct StubProvider {
    result: Result<String, ProviderError>,
    pub calls: AtomicUsize,
}

impl StubProvider {
    pub fn ok(html: &str) -> Self {
        Self {
            result: Ok(html.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: ProviderError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderProvider for StubProvider {
    async fn fetch(&self, _url: &Url) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

pub struct StubRobots {
    body: Option<String>,
    pub calls: AtomicUsize,
}

impl StubRobots {
    pub fn serving(body: &str) -> Self {
        Self {
            body: Some(body.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            body: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RobotsSource for StubRobots {
    async fn fetch(&self, _robots_url: &str) -> Result<String, RobotsFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.body.clone().ok_or(RobotsFetchError::Status(503))
    }
}

pub struct Harness {
    pub fetcher: Fetcher,
    pub render: Arc<RenderCounters>,
    pub provider: Arc<StubProvider>,
    pub robots: Arc<StubRobots>,
}

/// Fetcher wired to doubles, with backoff and challenge waits turned off
pub fn harness(script: PageScript, provider: StubProvider, robots: StubRobots) -> Harness {
    let renderer = ScriptedRenderer::new(script);
    let render = renderer.counters.clone();
    let provider = Arc::new(provider);
    let robots = Arc::new(robots);

    let config = LocalFetchConfig {
        challenge_wait: Duration::ZERO,
        content_marker_wait: Duration::ZERO,
        backoff: BackoffPolicy::Disabled,
        ..LocalFetchConfig::default()
    };
    let local = LocalFetchStrategy::new(
        Arc::new(renderer),
        RenderIdentity::default(),
        ChallengeDetector::default(),
        config,
    );
    let fetcher = Fetcher::new(
        Some(RobotsGate::new(robots.clone())),
        local,
        provider.clone(),
    );

    Harness {
        fetcher,
        render,
        provider,
        robots,
    }
}

pub const ALLOW_ALL: &str = "User-agent: *\nDisallow:\n";
pub const BLOCK_PRIVATE: &str = "User-agent: *\nDisallow: /private\n";
