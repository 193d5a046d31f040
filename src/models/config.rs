// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::identity::{ProxySettings, RenderIdentity};
use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_PROVIDER_ENDPOINT: &str = "https://app.scrapingbee.com/api/v1/";

/// Browser launch settings shared by every renderer session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    /// Base directory for per-session browser profiles
    pub user_data_dir: PathBuf,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            user_data_dir: env::temp_dir().join("render-agent"),
        }
    }
}

/// Render provider settings
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_PROVIDER_ENDPOINT.to_string(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Process-wide configuration. Read once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub bind_addr: String,
    pub port: u16,
    pub respect_robots: bool,
    pub identity: RenderIdentity,
    pub browser: BrowserSettings,
    pub provider: ProviderSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            respect_robots: true,
            identity: RenderIdentity::default(),
            browser: BrowserSettings::default(),
            provider: ProviderSettings::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = AgentConfig::default();

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| anyhow!("PORT must be a valid port number, got: {}", raw))?,
            None => defaults.port,
        };

        let respect_robots = parse_bool(get("RESPECT_ROBOTS"), "RESPECT_ROBOTS", true)?;
        let headless = parse_bool(get("HEADLESS"), "HEADLESS", true)?;

        let proxy = match get("PROXY_SERVER") {
            Some(server) => {
                let username = get("PROXY_USERNAME");
                let password = get("PROXY_PASSWORD");
                if username.is_some() != password.is_some() {
                    return Err(anyhow!(
                        "PROXY_USERNAME and PROXY_PASSWORD must be set together"
                    ));
                }
                Some(ProxySettings {
                    server,
                    username,
                    password,
                })
            }
            None => None,
        };

        let mut identity = RenderIdentity {
            proxy,
            ..RenderIdentity::default()
        };
        if let Some(ua) = get("RENDER_USER_AGENT") {
            identity.user_agent = ua;
        }
        if let Some(lang) = get("RENDER_ACCEPT_LANGUAGE") {
            identity.accept_language = lang;
        }
        if let Some(locale) = get("RENDER_LOCALE") {
            identity.locale = locale;
        }
        if let Some(tz) = get("RENDER_TIMEZONE") {
            identity.timezone = tz;
        }

        let browser = BrowserSettings {
            chrome_path: get("CHROME_PATH").map(PathBuf::from),
            headless,
            user_data_dir: get("USER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.browser.user_data_dir),
        };

        let provider = ProviderSettings {
            endpoint: get("PROVIDER_ENDPOINT").unwrap_or(defaults.provider.endpoint),
            api_key: get("PROVIDER_API_KEY"),
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            respect_robots,
            identity,
            browser,
            provider,
        })
    }
}

fn parse_bool(raw: Option<String>, key: &str, default: bool) -> Result<bool> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow!("{} must be true or false, got: {}", key, other)),
    }
}
