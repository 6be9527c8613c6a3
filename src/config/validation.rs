//! Configuration validation
//!
//! Validates configuration and reports issues.

use super::types::Config;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_provider_config(config, result);
    result = validate_dispatch_config(config, result);
    result = validate_preview_config(config, result);

    result
}

fn validate_provider_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    for (path, value) in [
        ("providers.judge0.base_url", &config.providers.judge0.base_url),
        ("providers.browser.base_url", &config.providers.browser.base_url),
    ] {
        if url::Url::parse(value).is_err() {
            result = result.with_error(
                ValidationIssue::new(path, format!("Invalid URL: {}", value))
                    .with_suggestion("Use an absolute http(s) URL"),
            );
        }
    }

    let browser = &config.providers.browser;
    if browser.default_timeout > browser.max_timeout {
        result = result.with_warning(ValidationIssue::new(
            "providers.browser.default_timeout",
            format!(
                "Default render timeout {:?} exceeds the maximum {:?} and will be capped",
                browser.default_timeout, browser.max_timeout
            ),
        ));
    }

    if config.providers.compiler_proxy.api_key.is_none() {
        result = result.with_warning(
            ValidationIssue::new(
                "providers.compiler_proxy.api_key",
                "No compiler proxy key configured. Only Judge0 will be used as a primary provider.",
            )
            .with_suggestion("Set RAPIDAPI_KEY to enable the compiler proxy"),
        );
    }

    result
}

fn validate_dispatch_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let dispatch = &config.dispatch;

    if dispatch.max_attempts == 0 {
        result = result.with_error(
            ValidationIssue::new("dispatch.max_attempts", "At least one attempt is required")
                .with_suggestion("Set dispatch.max_attempts to 1 or more"),
        );
    }

    if dispatch.default_time_limit_ms > dispatch.max_time_limit_ms {
        result = result.with_warning(ValidationIssue::new(
            "dispatch.default_time_limit_ms",
            format!(
                "Default time limit {}ms exceeds the maximum {}ms and will be capped",
                dispatch.default_time_limit_ms, dispatch.max_time_limit_ms
            ),
        ));
    }

    if dispatch.call_timeout.as_millis() < u128::from(dispatch.max_time_limit_ms) {
        result = result.with_warning(
            ValidationIssue::new(
                "dispatch.call_timeout",
                "Call timeout is shorter than the maximum time limit; long runs will surface as timeouts",
            )
            .with_suggestion("Raise dispatch.call_timeout above dispatch.max_time_limit_ms"),
        );
    }

    if dispatch.request_timeout < dispatch.call_timeout {
        result = result.with_warning(
            ValidationIssue::new(
                "dispatch.request_timeout",
                "Request timeout is shorter than a single provider call",
            )
            .with_suggestion("Raise dispatch.request_timeout above dispatch.call_timeout"),
        );
    }

    if dispatch.primary_order.is_empty() {
        result = result.with_error(ValidationIssue::new(
            "dispatch.primary_order",
            "No primary provider configured",
        ));
    }

    result
}

fn validate_preview_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.preview.console_capacity == 0 {
        result = result.with_error(ValidationIssue::new(
            "preview.console_capacity",
            "Console buffer must hold at least one message",
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        let result = validate_config(&config);

        // Default config should have warnings but no errors
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.dispatch.max_attempts = 0;
        config.providers.judge0.base_url = "not a url".to_string();
        config.preview.console_capacity = 0;

        let result = validate_config(&config);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_short_call_timeout_warns() {
        let mut config = Config::default();
        config.dispatch.call_timeout = Duration::from_secs(1);
        let result = validate_config(&config);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.path == "dispatch.call_timeout"));
    }

    #[test]
    fn test_request_timeout_below_call_timeout_warns() {
        let mut config = Config::default();
        config.dispatch.request_timeout = Duration::from_secs(5);
        let result = validate_config(&config);
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.path == "dispatch.request_timeout"));
    }

    #[test]
    fn test_browser_default_above_max_warns() {
        let mut config = Config::default();
        config.providers.browser.default_timeout = Duration::from_secs(120);
        let result = validate_config(&config);
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.path == "providers.browser.default_timeout"));
    }
}
