//! Provider trait - Abstract interface for execution back-ends
//!
//! Every back-end the dispatcher can route to implements `ExecutionProvider`:
//! - Hosted judge (Judge0, submit + poll)
//! - Compiler proxy (single call)
//! - Specialized local providers triggered by source heuristics
//! - Simulated fallback used when the primary reports an oversized artifact
//!
//! The dispatcher never names a concrete provider. It asks the registry for
//! one by capability and language.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::types::{ExecutionRequest, ExecutionResult};
use crate::error::Result;

/// What role a provider can play in dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Hosted judge with submit/poll semantics
    HostedJudge,
    /// Single-call remote compiler
    CompilerProxy,
    /// Pattern-triggered local substitute
    Specialized,
    /// Secondary provider used after an oversized-artifact failure
    Fallback,
}

impl Capability {
    /// Whether this capability makes a provider eligible as the primary
    pub fn is_primary(&self) -> bool {
        matches!(self, Capability::HostedJudge | Capability::CompilerProxy)
    }
}

/// Metadata about a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider name (e.g. `judge0`)
    pub name: String,
    /// Lower-cased language keys this provider accepts
    pub supported_languages: BTreeSet<String>,
    /// Roles this provider can play
    pub capabilities: BTreeSet<Capability>,
}

impl ProviderDescriptor {
    /// Create a descriptor
    pub fn new<L, S>(name: impl Into<String>, languages: L, capabilities: &[Capability]) -> Self
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProviderDescriptor {
            name: name.into(),
            supported_languages: languages
                .into_iter()
                .map(|l| l.into().to_lowercase())
                .collect(),
            capabilities: capabilities.iter().copied().collect(),
        }
    }

    /// Check whether a language is supported
    pub fn supports(&self, language: &str) -> bool {
        self.supported_languages.contains(&language.to_lowercase())
    }

    /// Check for a capability
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Abstract interface for execution providers
///
/// Implement this trait to add a new back-end.
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    /// Get provider metadata
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Get the provider name
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Check if a language is supported
    fn supports_language(&self, language: &str) -> bool {
        self.descriptor().supports(language)
    }

    /// Execute a request.
    ///
    /// Transport and protocol failures are returned as `Err`; program-level
    /// failures (compile errors, wrong exit code) are `Ok` results with a
    /// non-success status.
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult>;

    /// Health check
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_lookup() {
        let descriptor = ProviderDescriptor::new(
            "judge0",
            ["Python", "cpp"],
            &[Capability::HostedJudge],
        );

        assert!(descriptor.supports("python"));
        assert!(descriptor.supports("CPP"));
        assert!(!descriptor.supports("cobol"));
        assert!(descriptor.has(Capability::HostedJudge));
        assert!(!descriptor.has(Capability::Fallback));
    }

    #[test]
    fn test_primary_capabilities() {
        assert!(Capability::HostedJudge.is_primary());
        assert!(Capability::CompilerProxy.is_primary());
        assert!(!Capability::Specialized.is_primary());
        assert!(!Capability::Fallback.is_primary());
    }
}
