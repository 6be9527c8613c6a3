//! Provider configuration types
//!
//! Configuration for execution back-ends (Judge0, compiler proxy) and the
//! headless browser used by the web engine.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Hosted judge
    #[serde(default)]
    pub judge0: Judge0Config,
    /// RapidAPI compiler proxy (registered only when a key is present)
    #[serde(default)]
    pub compiler_proxy: CompilerProxyConfig,
    /// Remote headless browser
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Judge0 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judge0Config {
    /// Base URL
    #[serde(default = "default_judge0_url")]
    pub base_url: String,
    /// Optional X-Auth-Token for self-hosted instances
    #[serde(skip_serializing, default)]
    pub auth_token: Option<SecretString>,
    /// Interval between result polls
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Per-HTTP-request timeout
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for Judge0Config {
    fn default() -> Self {
        Judge0Config {
            base_url: default_judge0_url(),
            auth_token: None,
            poll_interval: default_poll_interval(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_judge0_url() -> String {
    "https://ce.judge0.com".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

/// Compiler proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerProxyConfig {
    /// API key (provider is disabled when absent)
    #[serde(skip_serializing, default)]
    pub api_key: Option<SecretString>,
    /// RapidAPI host header value
    #[serde(default = "default_rapidapi_host")]
    pub host: String,
    /// Base URL (defaults to https://{host})
    pub base_url: Option<String>,
    /// Per-HTTP-request timeout
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for CompilerProxyConfig {
    fn default() -> Self {
        CompilerProxyConfig {
            api_key: None,
            host: default_rapidapi_host(),
            base_url: None,
            request_timeout: default_request_timeout(),
        }
    }
}

impl CompilerProxyConfig {
    /// Effective base URL
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", self.host))
    }
}

fn default_rapidapi_host() -> String {
    "online-code-compiler.p.rapidapi.com".to_string()
}

/// Remote headless browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Base URL of the browser service
    #[serde(default = "default_browser_url")]
    pub base_url: String,
    /// Optional access token (sent as `token` query parameter)
    #[serde(skip_serializing, default)]
    pub token: Option<SecretString>,
    /// Default navigation/render timeout
    #[serde(with = "humantime_serde", default = "default_browser_timeout")]
    pub default_timeout: Duration,
    /// Upper bound for caller-supplied timeouts
    #[serde(with = "humantime_serde", default = "default_browser_max_timeout")]
    pub max_timeout: Duration,
    /// Default viewport width
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    /// Default viewport height
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        BrowserConfig {
            base_url: default_browser_url(),
            token: None,
            default_timeout: default_browser_timeout(),
            max_timeout: default_browser_max_timeout(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

fn default_browser_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_browser_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_browser_max_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_viewport_width() -> u32 {
    1200
}

fn default_viewport_height() -> u32 {
    800
}
