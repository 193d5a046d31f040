// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

/// Desktop Chrome on Linux, matching the platform the headless browser really runs on
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "es-ES,es;q=0.9,en;q=0.8";
pub const DEFAULT_LOCALE: &str = "es-ES";
pub const DEFAULT_TIMEZONE: &str = "Europe/Madrid";
pub const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 1366,
    height: 768,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Upstream proxy the browser should route through
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// e.g. `http://proxy.internal:8080`
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxySettings {
    /// Credentials are only usable as a pair
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

// Password stays out of logs
impl std::fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySettings")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Everything a renderer session needs to look like a regular desktop browser.
///
/// Passed explicitly into each session instead of being installed on a shared
/// browser launcher, so two sessions can never leak settings into each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderIdentity {
    pub user_agent: String,
    pub accept_language: String,
    pub locale: String,
    pub timezone: String,
    pub viewport: Viewport,
    pub proxy: Option<ProxySettings>,
    /// Hide `navigator.webdriver` and the automation blink feature
    pub mask_automation: bool,
}

impl Default for RenderIdentity {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            viewport: DEFAULT_VIEWPORT,
            proxy: None,
            mask_automation: true,
        }
    }
}

impl RenderIdentity {
    /// Primary language tag for the `--lang` browser flag
    pub fn primary_language(&self) -> &str {
        self.accept_language
            .split(',')
            .next()
            .map(|tag| tag.split(';').next().unwrap_or(tag).trim())
            .filter(|tag| !tag.is_empty())
            .unwrap_or("en-US")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_identity_uses_desktop_viewport() {
        let identity = RenderIdentity::default();
        assert_eq!(identity.viewport, Viewport { width: 1366, height: 768 });
        assert!(identity.user_agent.contains("Chrome"));
        assert!(identity.proxy.is_none());
    }

    #[test]
    fn test_primary_language() {
        let mut identity = RenderIdentity::default();
        assert_eq!(identity.primary_language(), "es-ES");

        identity.accept_language = "en-GB;q=0.9".to_string();
        assert_eq!(identity.primary_language(), "en-GB");

        identity.accept_language = String::new();
        assert_eq!(identity.primary_language(), "en-US");
    }

    #[test]
    fn test_proxy_credentials_need_both_parts() {
        let mut proxy = ProxySettings {
            server: "http://proxy:8080".to_string(),
            username: Some("user".to_string()),
            password: None,
        };
        assert!(proxy.credentials().is_none());

        proxy.password = Some("secret".to_string());
        assert_eq!(proxy.credentials(), Some(("user", "secret")));
    }

    #[test]
    fn test_proxy_debug_hides_password() {
        let proxy = ProxySettings {
            server: "http://proxy:8080".to_string(),
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
        };
        let printed = format!("{:?}", proxy);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("***"));
    }
}
