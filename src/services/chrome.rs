// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Headless Chromium renderer over CDP.
//!
//! Every session launches its own browser process with its own profile
//! directory, so nothing (cookies, cache, identity) is shared between requests.

use crate::error::RenderError;
use crate::models::config::BrowserSettings;
use crate::models::fetch::WaitStrategy;
use crate::models::identity::RenderIdentity;
use crate::services::renderer::{NavigationResponse, RenderSession, Renderer};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetLocaleOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, PrintToPdfParams,
};
use chromiumoxide::auth::Credentials;
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use url::Url;
use uuid::Uuid;

const MASK_AUTOMATION_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    window.chrome = window.chrome || { runtime: {} };
"#;

const READY_STATE_SCRIPT: &str = "document.readyState";
const RESOURCE_COUNT_SCRIPT: &str = "performance.getEntriesByType('resource').length";
const NAVIGATION_STATUS_SCRIPT: &str = r#"
    (() => {
        const entry = performance.getEntriesByType('navigation')[0];
        return entry && entry.responseStatus ? entry.responseStatus : 200;
    })()
"#;
/// Set on the outgoing document so the poll can tell when a new one replaced it
const NAVIGATION_MARKER: &str = "__renderAgentNavigation";
const VISIBLE_TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);

/// A4 in inches, the unit CDP expects
const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;
const PDF_MARGIN_IN: f64 = 10.0 / 25.4;

/// Chromium command line flags for one session, excluding the profile directory
pub fn browser_args(identity: &RenderIdentity) -> Vec<String> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-infobars".to_string(),
        format!("--lang={}", identity.primary_language()),
        format!("--user-agent={}", identity.user_agent),
    ];
    if identity.mask_automation {
        args.push("--disable-blink-features=AutomationControlled".to_string());
    }
    if let Some(proxy) = &identity.proxy {
        args.push(format!("--proxy-server={}", proxy.server));
    }
    args
}

pub struct ChromeRenderer {
    settings: BrowserSettings,
    navigation_timeout: Duration,
}

impl ChromeRenderer {
    pub fn new(settings: BrowserSettings, navigation_timeout: Duration) -> Self {
        Self {
            settings,
            navigation_timeout,
        }
    }

    fn browser_config(
        &self,
        identity: &RenderIdentity,
        profile_dir: &Path,
    ) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder()
            .viewport(CdpViewport {
                width: identity.viewport.width,
                height: identity.viewport.height,
                ..Default::default()
            })
            .request_timeout(self.navigation_timeout)
            .user_data_dir(profile_dir);

        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        for arg in browser_args(identity) {
            builder = builder.arg(arg);
        }

        builder
            .build()
            .map_err(|e| RenderError::LaunchFailed(format!("invalid browser config: {}", e)))
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn open(&self, identity: &RenderIdentity) -> Result<Box<dyn RenderSession>, RenderError> {
        let profile_dir = self.settings.user_data_dir.join(Uuid::now_v7().to_string());
        tokio::fs::create_dir_all(&profile_dir)
            .await
            .map_err(|e| RenderError::LaunchFailed(format!("cannot create profile dir: {}", e)))?;

        let config = match self.browser_config(identity, &profile_dir) {
            Ok(config) => config,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&profile_dir).await;
                return Err(e);
            }
        };

        let (browser, mut handler) = match Browser::launch(config).await {
            Ok(launched) => launched,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&profile_dir).await;
                return Err(RenderError::LaunchFailed(e.to_string()));
            }
        };

        let closed = Arc::new(AtomicBool::new(false));
        let handler_closed = closed.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "Browser handler event error");
                }
            }
            handler_closed.store(true, Ordering::SeqCst);
        });

        let mut session = ChromeSession {
            browser: Some(browser),
            page: None,
            handler_task,
            closed,
            profile_dir: Some(profile_dir),
        };

        if let Err(e) = session.prepare_page(identity).await {
            let _ = session.close().await;
            return Err(match e {
                RenderError::LaunchFailed(reason) => RenderError::LaunchFailed(reason),
                other => RenderError::LaunchFailed(format!("page setup failed: {}", other)),
            });
        }

        tracing::debug!(
            user_agent = %identity.user_agent,
            timezone = %identity.timezone,
            proxy = identity.proxy.is_some(),
            "Browser session opened"
        );
        Ok(Box::new(session))
    }
}

pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    closed: Arc<AtomicBool>,
    profile_dir: Option<PathBuf>,
}

impl ChromeSession {
    async fn prepare_page(&mut self, identity: &RenderIdentity) -> Result<(), RenderError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| RenderError::SessionClosed("browser already closed".to_string()))?;
        let page = browser.new_page("about:blank").await?;

        let mut user_agent = SetUserAgentOverrideParams::new(identity.user_agent.clone());
        user_agent.accept_language = Some(identity.accept_language.clone());
        page.execute(user_agent).await?;

        page.execute(SetTimezoneOverrideParams::new(identity.timezone.clone()))
            .await?;
        let locale = SetLocaleOverrideParams {
            locale: Some(identity.locale.clone()),
        };
        if let Err(e) = page.execute(locale).await {
            // Some builds reject locales they do not ship
            tracing::debug!(locale = %identity.locale, error = %e, "Locale override rejected");
        }

        if identity.mask_automation {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
                MASK_AUTOMATION_SCRIPT,
            ))
            .await?;
        }

        if let Some((username, password)) = identity.proxy.as_ref().and_then(|p| p.credentials()) {
            page.authenticate(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        }

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page, RenderError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RenderError::SessionClosed("browser connection lost".to_string()));
        }
        self.page
            .as_ref()
            .ok_or_else(|| RenderError::SessionClosed("page already closed".to_string()))
    }

    fn map_err(&self, err: chromiumoxide::error::CdpError) -> RenderError {
        if self.closed.load(Ordering::SeqCst) {
            RenderError::SessionClosed(err.to_string())
        } else {
            err.into()
        }
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, RenderError> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| self.map_err(e))?;
        result
            .into_value::<T>()
            .map_err(|e| RenderError::Cdp(format!("unexpected script result: {}", e)))
    }

    async fn wait_until_ready(&self, wait: WaitStrategy, deadline: Instant) -> Result<(), RenderError> {
        let mut last_count: Option<i64> = None;
        let mut quiet_since = Instant::now();

        loop {
            let state: String = self.eval(READY_STATE_SCRIPT).await?;
            let dom_ready = state != "loading";

            let ready = match wait {
                WaitStrategy::DomContentLoaded => dom_ready,
                WaitStrategy::NetworkIdle => {
                    let count: i64 = self.eval(RESOURCE_COUNT_SCRIPT).await?;
                    if last_count != Some(count) {
                        last_count = Some(count);
                        quiet_since = Instant::now();
                    }
                    state == "complete" && quiet_since.elapsed() >= NETWORK_QUIET_WINDOW
                }
            };
            if ready {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(RenderError::Timeout(format!("{} not reached", wait)));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Drive `goto` until the page is navigated. For `DomContentLoaded` the
/// navigation also counts as settled once `dom_ready` reports a parsed new
/// document, so a `load` event that never fires does not hold it up.
async fn settle_navigation<G, R, F>(
    wait: WaitStrategy,
    goto: G,
    mut dom_ready: R,
    nav_timeout: Duration,
) -> Result<(), RenderError>
where
    G: Future<Output = Result<(), RenderError>>,
    R: FnMut() -> F,
    F: Future<Output = bool>,
{
    let settled = async {
        match wait {
            WaitStrategy::NetworkIdle => goto.await,
            WaitStrategy::DomContentLoaded => {
                let parsed = async {
                    while !dom_ready().await {
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                };
                tokio::select! {
                    result = goto => result,
                    () = parsed => Ok(()),
                }
            }
        }
    };

    match timeout(nav_timeout, settled).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::Timeout(format!(
            "navigation exceeded {}s",
            nav_timeout.as_secs()
        ))),
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn navigate(
        &mut self,
        url: &Url,
        wait: WaitStrategy,
        nav_timeout: Duration,
    ) -> Result<NavigationResponse, RenderError> {
        let deadline = Instant::now() + nav_timeout;
        let token = Uuid::now_v7().simple().to_string();
        let marked = self
            .eval::<String>(&format!("window.{NAVIGATION_MARKER} = '{token}'"))
            .await
            .is_ok();
        // An unmarked document cannot be told apart from its replacement
        let settle_on = if marked { wait } else { WaitStrategy::NetworkIdle };

        let session = &*self;
        let page = session.page()?;
        let goto = async {
            page.goto(url.as_str()).await.map(|_| ()).map_err(|e| {
                match session.map_err(e) {
                    RenderError::Cdp(reason) => RenderError::NavigationFailed(reason),
                    other => other,
                }
            })
        };
        let ready_script = format!(
            "window.{NAVIGATION_MARKER} !== '{token}' && document.readyState !== 'loading'"
        );
        let ready_script = ready_script.as_str();
        let dom_ready = move || async move { session.eval::<bool>(ready_script).await.unwrap_or(false) };
        settle_navigation(settle_on, goto, dom_ready, nav_timeout).await?;

        self.wait_until_ready(wait, deadline).await?;

        let status: i64 = self.eval(NAVIGATION_STATUS_SCRIPT).await?;
        let status = u16::try_from(status).unwrap_or(200);
        Ok(NavigationResponse { status })
    }

    async fn visible_text(&mut self) -> Result<String, RenderError> {
        self.eval(VISIBLE_TEXT_SCRIPT).await
    }

    async fn wait_for_selector(&mut self, selector: &str, max_wait: Duration) -> Result<(), RenderError> {
        let deadline = Instant::now() + max_wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let page = self.page()?;
            if let Ok(Ok(_)) = timeout(remaining, page.find_element(selector)).await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RenderError::Timeout(format!("selector '{}' not found", selector)));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        let page = self.page()?;
        page.content().await.map_err(|e| self.map_err(e))
    }

    async fn screenshot(&mut self, full_page: bool) -> Result<Vec<u8>, RenderError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();
        self.page()?
            .screenshot(params)
            .await
            .map_err(|e| RenderError::Capture(e.to_string()))
    }

    async fn pdf(&mut self) -> Result<Vec<u8>, RenderError> {
        let params = PrintToPdfParams {
            print_background: Some(true),
            paper_width: Some(A4_WIDTH_IN),
            paper_height: Some(A4_HEIGHT_IN),
            margin_top: Some(PDF_MARGIN_IN),
            margin_bottom: Some(PDF_MARGIN_IN),
            margin_left: Some(PDF_MARGIN_IN),
            margin_right: Some(PDF_MARGIN_IN),
            ..Default::default()
        };
        self.page()?
            .pdf(params)
            .await
            .map_err(|e| RenderError::Capture(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "Page close failed");
            }
        }

        let mut result = Ok(());
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                result = Err(RenderError::Cdp(format!("browser close failed: {}", e)));
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!(error = %e, "Waiting for browser exit failed");
            }
        }
        self.handler_task.abort();

        if let Some(dir) = self.profile_dir.take() {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                tracing::debug!(dir = %dir.display(), error = %e, "Failed to remove profile dir");
            }
        }
        result
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // Reached without close() when the caller was cancelled; the browser
        // process itself is killed when `Browser` drops.
        self.handler_task.abort();
        if let Some(dir) = self.profile_dir.take() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::ProxySettings;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_args_are_container_safe() {
        let args = browser_args(&RenderIdentity::default());
        for flag in ["--no-sandbox", "--disable-dev-shm-usage", "--disable-gpu"] {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
    }

    #[test]
    fn test_args_carry_identity() {
        let identity = RenderIdentity::default();
        let args = browser_args(&identity);
        assert!(args.contains(&format!("--user-agent={}", identity.user_agent)));
        assert!(args.contains(&"--lang=es-ES".to_string()));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
    }

    #[test]
    fn test_args_add_proxy_server_without_credentials() {
        let identity = RenderIdentity {
            proxy: Some(ProxySettings {
                server: "http://proxy:3128".to_string(),
                username: Some("bob".to_string()),
                password: Some("hunter2".to_string()),
            }),
            mask_automation: false,
            ..RenderIdentity::default()
        };
        let args = browser_args(&identity);
        assert!(args.contains(&"--proxy-server=http://proxy:3128".to_string()));
        assert!(!args.iter().any(|a| a.contains("hunter2")));
        assert!(!args.iter().any(|a| a.contains("AutomationControlled")));
    }

    #[test]
    fn test_a4_margins_are_ten_millimetres() {
        assert!((PDF_MARGIN_IN * 25.4 - 10.0).abs() < 1e-9);
    }

    /// Readiness check that reports a parsed document from its `ready_after`th call on
    fn parsed_after(calls: &AtomicUsize, ready_after: usize) -> impl FnMut() -> std::future::Ready<bool> + '_ {
        move || std::future::ready(calls.fetch_add(1, Ordering::SeqCst) + 1 >= ready_after)
    }

    #[tokio::test(start_paused = true)]
    async fn test_dom_content_loaded_settles_without_load_event() {
        let calls = AtomicUsize::new(0);
        let load_never_fires = std::future::pending::<Result<(), RenderError>>();

        settle_navigation(
            WaitStrategy::DomContentLoaded,
            load_never_fires,
            parsed_after(&calls, 3),
            Duration::from_secs(45),
        )
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_idle_waits_for_load_event() {
        let calls = AtomicUsize::new(0);
        let load_never_fires = std::future::pending::<Result<(), RenderError>>();

        let err = settle_navigation(
            WaitStrategy::NetworkIdle,
            load_never_fires,
            parsed_after(&calls, 1),
            Duration::from_secs(45),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_error_wins_over_parsed_after() {
        let calls = AtomicUsize::new(0);
        let failed = async { Err(RenderError::NavigationFailed("net::ERR_ABORTED".to_string())) };

        let err = settle_navigation(
            WaitStrategy::DomContentLoaded,
            failed,
            parsed_after(&calls, usize::MAX),
            Duration::from_secs(45),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RenderError::NavigationFailed(_)));
    }
}
