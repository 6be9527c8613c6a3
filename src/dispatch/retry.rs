//! Retry policy for primary provider calls

use backoff::backoff::Backoff;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DispatchConfig;
use crate::core::ExecutionRequest;

/// Produces the source submitted on a retry
pub trait RetryTransform: Send + Sync {
    /// Rewrite the request for the next attempt
    fn transform(&self, request: &ExecutionRequest) -> ExecutionRequest;
}

/// Drops comment-only lines to shrink the compiled artifact
///
/// A line is dropped when its trimmed text starts with `//` or `/*`, or ends
/// with `*/`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StripComments;

impl StripComments {
    pub fn strip(source: &str) -> String {
        source
            .split('\n')
            .filter(|line| {
                let trimmed = line.trim();
                !(trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.ends_with("*/"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl RetryTransform for StripComments {
    fn transform(&self, request: &ExecutionRequest) -> ExecutionRequest {
        request.with_source(Self::strip(&request.source))
    }
}

/// Resubmits the request unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct Unchanged;

impl RetryTransform for Unchanged {
    fn transform(&self, request: &ExecutionRequest) -> ExecutionRequest {
        request.clone()
    }
}

/// Linear backoff with a bounded number of retries: `base × n` before retry `n`
#[derive(Debug, Clone)]
pub struct LimitedBackoff {
    base: Duration,
    retries: u32,
    max_retries: u32,
}

impl LimitedBackoff {
    pub fn new(base: Duration, max_retries: u32) -> Self {
        LimitedBackoff {
            base,
            retries: 0,
            max_retries,
        }
    }
}

impl Backoff for LimitedBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries >= self.max_retries {
            return None;
        }
        self.retries += 1;
        Some(self.base * self.retries)
    }

    fn reset(&mut self) {
        self.retries = 0;
    }
}

/// How the dispatcher retries the primary provider
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base delay between attempts
    pub base_delay: Duration,
    /// Source rewrite applied before each retry
    pub transform: Arc<dyn RetryTransform>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
            transform: Arc::new(StripComments),
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        let policy = Self::new(config.max_attempts, config.retry_backoff);
        if config.strip_comments_on_retry {
            policy
        } else {
            policy.with_transform(Unchanged)
        }
    }

    /// Replace the retry transform
    pub fn with_transform<T: RetryTransform + 'static>(mut self, transform: T) -> Self {
        self.transform = Arc::new(transform);
        self
    }

    /// Fresh backoff schedule for one request
    pub fn backoff(&self) -> LimitedBackoff {
        LimitedBackoff::new(self.base_delay, self.max_attempts.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}
