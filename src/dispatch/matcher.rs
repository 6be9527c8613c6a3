//! Specialized provider matching

use crate::core::ExecutionRequest;

/// Decides whether a request should bypass the primary provider and go to a
/// specialized one.
///
/// The matcher only fires when the named provider is registered and claims
/// the request's language.
pub trait SpecializedProviderMatcher: Send + Sync {
    /// Name of the provider this matcher routes to
    fn provider_name(&self) -> &str;

    /// Whether the request should be handled by that provider
    fn matches(&self, request: &ExecutionRequest) -> bool;
}
