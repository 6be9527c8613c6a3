//! Provider registry - capability-indexed set of execution providers

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::core::{Capability, ExecutionProvider, ProviderDescriptor};

/// Registry of available providers
///
/// Iteration follows registration order.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ExecutionProvider>>,
    order: Vec<String>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        ProviderRegistry {
            providers: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a provider, replacing any provider with the same name
    pub fn register<P: ExecutionProvider + 'static>(&mut self, provider: P) {
        self.register_arc(Arc::new(provider));
    }

    /// Register a shared provider
    pub fn register_arc(&mut self, provider: Arc<dyn ExecutionProvider>) {
        let name = provider.name().to_string();
        if self.providers.insert(name.clone(), provider).is_none() {
            self.order.push(name);
        }
    }

    /// Get a provider by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ExecutionProvider>> {
        self.providers.get(name).cloned()
    }

    /// All providers, in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ExecutionProvider>> {
        self.order.iter().filter_map(|name| self.providers.get(name))
    }

    /// Providers with a capability, in registration order
    pub fn with_capability(&self, capability: Capability) -> Vec<Arc<dyn ExecutionProvider>> {
        self.iter()
            .filter(|p| p.descriptor().has(capability))
            .cloned()
            .collect()
    }

    /// First provider with `capability` that supports `language`
    pub fn find(&self, capability: Capability, language: &str) -> Option<Arc<dyn ExecutionProvider>> {
        self.iter()
            .find(|p| p.descriptor().has(capability) && p.supports_language(language))
            .cloned()
    }

    /// Union of languages across providers matching `filter`
    pub fn languages_where<F>(&self, filter: F) -> BTreeSet<String>
    where
        F: Fn(&ProviderDescriptor) -> bool,
    {
        self.iter()
            .map(|p| p.descriptor())
            .filter(|d| filter(d))
            .flat_map(|d| d.supported_languages.iter().cloned())
            .collect()
    }

    /// All provider descriptors
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.iter().map(|p| p.descriptor().clone()).collect()
    }

    /// Get provider count
    pub fn count(&self) -> usize {
        self.providers.len()
    }

    /// List provider names
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExecutionRequest, ExecutionResult};
    use crate::error::Result;
    use async_trait::async_trait;

    struct Named(ProviderDescriptor);

    #[async_trait]
    impl ExecutionProvider for Named {
        fn descriptor(&self) -> &ProviderDescriptor {
            &self.0
        }

        async fn execute(&self, _request: &ExecutionRequest) -> Result<ExecutionResult> {
            Ok(ExecutionResult::success("", 0))
        }
    }

    fn named(name: &str, languages: &[&str], capability: Capability) -> Named {
        Named(ProviderDescriptor::new(
            name,
            languages.iter().copied(),
            &[capability],
        ))
    }

    #[test]
    fn test_register_and_find() {
        let mut registry = ProviderRegistry::new();
        registry.register(named("a", &["python"], Capability::HostedJudge));
        registry.register(named("b", &["python", "go"], Capability::CompilerProxy));
        registry.register(named("sim", &["python"], Capability::Fallback));

        assert_eq!(registry.count(), 3);
        assert_eq!(registry.names(), vec!["a", "b", "sim"]);
        assert_eq!(
            registry.find(Capability::CompilerProxy, "go").unwrap().name(),
            "b"
        );
        assert!(registry.find(Capability::HostedJudge, "go").is_none());
        assert_eq!(registry.with_capability(Capability::Fallback).len(), 1);

        let primary = registry.languages_where(|d| d.capabilities.iter().any(|c| c.is_primary()));
        assert_eq!(
            primary.into_iter().collect::<Vec<_>>(),
            vec!["go".to_string(), "python".to_string()]
        );
    }

    #[test]
    fn test_reregister_replaces_without_duplicating() {
        let mut registry = ProviderRegistry::new();
        registry.register(named("a", &["python"], Capability::HostedJudge));
        registry.register(named("a", &["go"], Capability::HostedJudge));

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.names(), vec!["a"]);
        assert!(registry.get("a").unwrap().supports_language("go"));
    }
}
