//! Dispatch module - Routes execution requests to providers
//!
//! A request moves through
//! `received → checked → provider-selected → awaiting → (success | retry | fallback) → returned`:
//! - Security pre-filter (no provider call on rejection)
//! - Specialized matchers (local substitutes)
//! - Primary provider with retry
//! - Fallback provider after an oversized-artifact failure
//! - Output normalization
//!
//! `Dispatcher::dispatch` never fails. Every provider error becomes a result
//! with a non-success status.

mod matcher;
mod registry;
mod retry;
mod syntax;

pub use matcher::SpecializedProviderMatcher;
pub use registry::ProviderRegistry;
pub use retry::{LimitedBackoff, RetryPolicy, RetryTransform, StripComments, Unchanged};
pub use syntax::{validate_syntax, SyntaxReport};

use backoff::backoff::Backoff;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{Config, DispatchConfig};
use crate::core::{
    Capability, ExecutionProvider, ExecutionRequest, ExecutionResult, ExecutionStatus,
};
use crate::error::{Error, Result};
use crate::providers;
use crate::security::SecurityFilter;

/// Appended to stdout that was cut at `max_output_chars`
pub const TRUNCATION_MARKER: &str = "\n\n[Output truncated due to size limits]";

/// Prefix marking a result produced by the fallback provider
pub const FALLBACK_PREFIX: &str = "[FALLBACK] ";

const FALLBACK_NOTE: &str = "[FALLBACK] Executed using alternative service";

/// Request counters
#[derive(Debug, Default)]
struct DispatchStats {
    by_status: [AtomicU64; 5],
    fallbacks: AtomicU64,
    security_rejections: AtomicU64,
}

impl DispatchStats {
    fn record(&self, status: ExecutionStatus, fallback: bool) {
        let index = ExecutionStatus::ALL
            .iter()
            .position(|s| *s == status)
            .unwrap_or(0);
        self.by_status[index].fetch_add(1, Ordering::Relaxed);
        if fallback {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Point-in-time view of the dispatcher counters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub by_status: BTreeMap<&'static str, u64>,
    pub fallbacks: u64,
    pub security_rejections: u64,
    pub uptime_secs: u64,
}

/// How a request was answered
struct Outcome {
    result: ExecutionResult,
    provider: Option<String>,
    fallback: bool,
}

impl Outcome {
    fn local(result: ExecutionResult) -> Self {
        Outcome {
            result,
            provider: None,
            fallback: false,
        }
    }
}

/// Routes requests to providers
pub struct Dispatcher {
    registry: ProviderRegistry,
    matchers: Vec<Box<dyn SpecializedProviderMatcher>>,
    security: Option<SecurityFilter>,
    retry: RetryPolicy,
    config: DispatchConfig,
    stats: DispatchStats,
    started: Instant,
}

impl Dispatcher {
    /// Create a dispatcher from its parts
    pub fn new(
        registry: ProviderRegistry,
        matchers: Vec<Box<dyn SpecializedProviderMatcher>>,
        security: Option<SecurityFilter>,
        retry: RetryPolicy,
        config: DispatchConfig,
    ) -> Self {
        Dispatcher {
            registry,
            matchers,
            security,
            retry,
            config,
            stats: DispatchStats::default(),
            started: Instant::now(),
        }
    }

    /// Create a dispatcher with every configured provider
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = providers::create_registry(&config.providers)?;
        let security = if config.security.enabled {
            Some(SecurityFilter::new(config.security.mode)?)
        } else {
            warn!("Security pre-filter disabled");
            None
        };

        Ok(Self::new(
            registry,
            providers::default_matchers(),
            security,
            RetryPolicy::from_config(&config.dispatch),
            config.dispatch.clone(),
        ))
    }

    /// Provider registry
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Languages accepted by `validate`: primary and specialized providers
    pub fn supported_languages(&self) -> BTreeSet<String> {
        self.registry.languages_where(|d| {
            d.capabilities
                .iter()
                .any(|c| c.is_primary() || *c == Capability::Specialized)
        })
    }

    /// Languages a primary provider can run
    pub fn primary_languages(&self) -> BTreeSet<String> {
        self.registry
            .languages_where(|d| d.capabilities.iter().any(|c| c.is_primary()))
    }

    /// Check a raw request body. No provider is contacted.
    pub fn validate(&self, body: &Value) -> Result<ExecutionRequest> {
        let request = ExecutionRequest::from_json(body)?;

        let length = request.source.chars().count();
        if length > self.config.max_source_chars {
            return Err(Error::Validation(format!(
                "Code exceeds maximum length of {} characters",
                self.config.max_source_chars
            )));
        }

        let supported = self.supported_languages();
        if !supported.contains(&request.language) {
            return Err(Error::Validation(format!(
                "Unsupported language: {}. Supported languages: {}",
                request.language,
                supported.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }

        Ok(request)
    }

    /// Basic syntax checks
    pub fn validate_syntax(&self, code: &str, language: &str) -> SyntaxReport {
        validate_syntax(code, language)
    }

    /// Execute a request and return a normalized result
    pub async fn dispatch(&self, mut request: ExecutionRequest) -> ExecutionResult {
        let received = Instant::now();

        let limit = request
            .time_limit_ms
            .unwrap_or(self.config.default_time_limit_ms)
            .min(self.config.max_time_limit_ms);
        request.time_limit_ms = Some(limit);

        let outcome =
            match tokio::time::timeout(self.config.request_timeout, self.route(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        language = %request.language,
                        timeout_ms = self.config.request_timeout.as_millis() as u64,
                        "Request deadline exceeded"
                    );
                    Outcome::local(Self::error_result(Error::ProviderTimeout(
                        self.config.request_timeout.as_millis() as u64,
                    )))
                }
            };
        let result = self.normalize(outcome.result, received);

        self.stats.record(result.status, outcome.fallback);
        info!(
            language = %request.language,
            source_len = request.source.len(),
            has_stdin = request.has_stdin(),
            status = %result.status,
            duration_ms = result.duration_ms,
            provider = outcome.provider.as_deref().unwrap_or("none"),
            fallback = outcome.fallback,
            "Code execution completed"
        );

        result
    }

    /// Health of every registered provider, keyed by name
    ///
    /// Each check is bounded by `call_timeout`; errors and timeouts count as
    /// unhealthy.
    pub async fn provider_health(&self) -> BTreeMap<String, bool> {
        let mut health = BTreeMap::new();
        for provider in self.registry.iter() {
            let healthy =
                match tokio::time::timeout(self.config.call_timeout, provider.health_check()).await {
                    Ok(Ok(healthy)) => healthy,
                    Ok(Err(e)) => {
                        warn!(provider = provider.name(), error = %e, "Provider health check failed");
                        false
                    }
                    Err(_) => {
                        warn!(provider = provider.name(), "Provider health check timed out");
                        false
                    }
                };
            health.insert(provider.name().to_string(), healthy);
        }
        health
    }

    /// Counter snapshot
    pub fn stats(&self) -> StatsSnapshot {
        let by_status: BTreeMap<&'static str, u64> = ExecutionStatus::ALL
            .iter()
            .zip(self.stats.by_status.iter())
            .map(|(status, count)| (status.as_str(), count.load(Ordering::Relaxed)))
            .collect();

        StatsSnapshot {
            total_requests: by_status.values().sum(),
            by_status,
            fallbacks: self.stats.fallbacks.load(Ordering::Relaxed),
            security_rejections: self.stats.security_rejections.load(Ordering::Relaxed),
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }

    async fn route(&self, request: &ExecutionRequest) -> Outcome {
        if let Some(ref filter) = self.security {
            if let Err(violation) = filter.check(&request.language, &request.source) {
                self.stats.security_rejections.fetch_add(1, Ordering::Relaxed);
                let error = Error::from(violation);
                return Outcome::local(ExecutionResult::failure(
                    ExecutionStatus::Error,
                    error.to_string(),
                ));
            }
        }

        if let Some(provider) = self.specialized_for(request) {
            info!(provider = provider.name(), "Using specialized provider");
            let result = self.call_converted(provider.as_ref(), request).await;
            return Outcome {
                result,
                provider: Some(provider.name().to_string()),
                fallback: false,
            };
        }

        let Some(primary) = self.select_primary(&request.language) else {
            return Outcome::local(ExecutionResult::failure(
                ExecutionStatus::Error,
                format!("No execution provider available for language {}", request.language),
            ));
        };

        let result = self.execute_with_retry(primary.as_ref(), request).await;

        if result.status == ExecutionStatus::OversizedArtifact {
            if let Some(fallback) = self.registry.find(Capability::Fallback, &request.language) {
                warn!(
                    primary = primary.name(),
                    fallback = fallback.name(),
                    language = %request.language,
                    "Primary reported an oversized artifact, using fallback provider"
                );
                let mut result = self.call_converted(fallback.as_ref(), request).await;
                result.error = Some(match result.error {
                    Some(error) => format!("{}{}", FALLBACK_PREFIX, error),
                    None => FALLBACK_NOTE.to_string(),
                });
                return Outcome {
                    result,
                    provider: Some(fallback.name().to_string()),
                    fallback: true,
                };
            }
        }

        Outcome {
            result,
            provider: Some(primary.name().to_string()),
            fallback: false,
        }
    }

    fn specialized_for(&self, request: &ExecutionRequest) -> Option<Arc<dyn ExecutionProvider>> {
        self.matchers.iter().find_map(|matcher| {
            let provider = self.registry.get(matcher.provider_name())?;
            (provider.supports_language(&request.language) && matcher.matches(request))
                .then_some(provider)
        })
    }

    /// First primary provider in `primary_order` that supports the language,
    /// then any other primary in registration order
    fn select_primary(&self, language: &str) -> Option<Arc<dyn ExecutionProvider>> {
        let eligible = |p: &Arc<dyn ExecutionProvider>| {
            p.descriptor().capabilities.iter().any(|c| c.is_primary())
                && p.supports_language(language)
        };

        self.config
            .primary_order
            .iter()
            .filter_map(|name| self.registry.get(name))
            .find(|p| eligible(p))
            .or_else(|| self.registry.iter().find(|p| eligible(*p)).cloned())
    }

    async fn execute_with_retry(
        &self,
        provider: &dyn ExecutionProvider,
        request: &ExecutionRequest,
    ) -> ExecutionResult {
        let mut backoff = self.retry.backoff();
        let mut current = request.clone();
        let mut attempt = 1;

        loop {
            let outcome = self.call(provider, &current).await;

            let should_retry = match &outcome {
                Err(e) => e.is_retryable(),
                Ok(r) => r.status == ExecutionStatus::OversizedArtifact,
            };
            let delay = if should_retry {
                backoff.next_backoff()
            } else {
                None
            };

            let Some(delay) = delay else {
                return outcome.unwrap_or_else(Self::error_result);
            };

            match &outcome {
                Err(e) => warn!(provider = provider.name(), attempt, error = %e, "Attempt failed, retrying"),
                Ok(r) => warn!(provider = provider.name(), attempt, status = %r.status, "Attempt failed, retrying"),
            }

            tokio::time::sleep(delay).await;
            current = self.retry.transform.transform(&current);
            attempt += 1;
        }
    }

    /// One provider call bounded by `call_timeout`
    async fn call(
        &self,
        provider: &dyn ExecutionProvider,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult> {
        match tokio::time::timeout(self.config.call_timeout, provider.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::ProviderTimeout(
                self.config.call_timeout.as_millis() as u64,
            )),
        }
    }

    async fn call_converted(
        &self,
        provider: &dyn ExecutionProvider,
        request: &ExecutionRequest,
    ) -> ExecutionResult {
        self.call(provider, request)
            .await
            .unwrap_or_else(Self::error_result)
    }

    fn error_result(error: Error) -> ExecutionResult {
        match error {
            Error::ProviderTimeout(_) => {
                ExecutionResult::failure(ExecutionStatus::Timeout, error.to_string())
            }
            ref e if e.indicates_oversized_artifact() => ExecutionResult::failure(
                ExecutionStatus::OversizedArtifact,
                format!("Execution failed: {}", e),
            ),
            e => ExecutionResult::failure(ExecutionStatus::Error, format!("Execution failed: {}", e)),
        }
    }

    fn normalize(&self, mut result: ExecutionResult, received: Instant) -> ExecutionResult {
        let max = self.config.max_output_chars;
        if let Some((cut, _)) = result.stdout.char_indices().nth(max) {
            result.stdout.truncate(cut);
            result.stdout.push_str(TRUNCATION_MARKER);
        }
        result.duration_ms = received.elapsed().as_millis() as u64;
        result
    }
}
