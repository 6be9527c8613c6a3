//! Dispatch, security and preview configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dispatcher limits and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Sources longer than this (in characters) are rejected
    #[serde(default = "default_max_source")]
    pub max_source_chars: usize,
    /// Stdout longer than this (in characters) is truncated
    #[serde(default = "default_max_output")]
    pub max_output_chars: usize,
    /// Time limit applied when the request does not carry one
    #[serde(default = "default_time_limit")]
    pub default_time_limit_ms: u64,
    /// Upper bound for caller-supplied time limits
    #[serde(default = "default_max_time_limit")]
    pub max_time_limit_ms: u64,
    /// Wall-clock bound on every outbound provider call
    #[serde(with = "humantime_serde", default = "default_call_timeout")]
    pub call_timeout: Duration,
    /// Wall-clock bound on a whole request, retries and fallback included
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Attempts made against the primary provider
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts (multiplied by the attempt number)
    #[serde(with = "humantime_serde", default = "default_retry_backoff")]
    pub retry_backoff: Duration,
    /// Drop comment-only lines from the source before each retry
    #[serde(default = "default_true")]
    pub strip_comments_on_retry: bool,
    /// Preferred primary providers, by provider name
    #[serde(default = "default_primary_order")]
    pub primary_order: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            max_source_chars: default_max_source(),
            max_output_chars: default_max_output(),
            default_time_limit_ms: default_time_limit(),
            max_time_limit_ms: default_max_time_limit(),
            call_timeout: default_call_timeout(),
            request_timeout: default_request_timeout(),
            max_attempts: default_attempts(),
            retry_backoff: default_retry_backoff(),
            strip_comments_on_retry: true,
            primary_order: default_primary_order(),
        }
    }
}

fn default_max_source() -> usize {
    100_000
}

fn default_max_output() -> usize {
    50_000
}

fn default_time_limit() -> u64 {
    10_000
}

fn default_max_time_limit() -> u64 {
    30_000
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_attempts() -> u32 {
    2
}

fn default_retry_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_primary_order() -> Vec<String> {
    vec!["judge0".to_string(), "compiler-proxy".to_string()]
}

/// Deny-list strictness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// Dynamic eval and filesystem/process module imports only
    Basic,
    /// Full per-language deny list
    #[default]
    Strict,
}

impl std::str::FromStr for SecurityMode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" | "simple" => Ok(SecurityMode::Basic),
            "strict" | "secure" => Ok(SecurityMode::Strict),
            _ => Err(crate::error::Error::Config(format!(
                "Invalid security mode: {}. Valid: basic, strict",
                s
            ))),
        }
    }
}

/// Security pre-filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Run the pre-filter at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Deny-list strictness
    #[serde(default)]
    pub mode: SecurityMode,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            enabled: true,
            mode: SecurityMode::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Preview composition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Quiet period after the last edit before re-rendering
    #[serde(with = "humantime_serde", default = "default_debounce")]
    pub debounce: Duration,
    /// Console messages kept per preview
    #[serde(default = "default_console_capacity")]
    pub console_capacity: usize,
    /// Combined HTML + CSS + JS size accepted by the composer
    #[serde(default = "default_max_preview")]
    pub max_source_bytes: usize,
    /// Inject the console bridge script
    #[serde(default = "default_true")]
    pub console_bridge: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        PreviewConfig {
            debounce: default_debounce(),
            console_capacity: default_console_capacity(),
            max_source_bytes: default_max_preview(),
            console_bridge: true,
        }
    }
}

fn default_debounce() -> Duration {
    Duration::from_millis(500)
}

fn default_console_capacity() -> usize {
    100
}

fn default_max_preview() -> usize {
    1024 * 1024 // 1MB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_mode_parsing() {
        assert_eq!("basic".parse::<SecurityMode>().unwrap(), SecurityMode::Basic);
        assert_eq!("secure".parse::<SecurityMode>().unwrap(), SecurityMode::Strict);
        assert!("off".parse::<SecurityMode>().is_err());
    }

    #[test]
    fn test_dispatch_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.primary_order[0], "judge0");
    }
}
