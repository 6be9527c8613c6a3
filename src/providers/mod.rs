//! Providers module - Execution back-ends
//!
//! Four kinds of back-end:
//! - Judge0: hosted judge, submit then poll
//! - Compiler proxy: RapidAPI single-call compiler (needs an API key)
//! - Star pattern: local specialized provider
//! - Simulated: fallback after oversized-artifact failures

mod compiler_proxy;
mod judge0;
pub mod simulator;
pub mod star_pattern;

pub use compiler_proxy::{CompilerProxyProvider, COMPILER_PROXY_PROVIDER};
pub use judge0::{Judge0Provider, JUDGE0_PROVIDER};
pub use simulator::{SimulatedProvider, SIMULATED_PROVIDER};
pub use star_pattern::{StarPatternMatcher, StarPatternProvider, STAR_PATTERN_PROVIDER};

use tracing::info;

use crate::config::ProvidersConfig;
use crate::dispatch::{ProviderRegistry, SpecializedProviderMatcher};
use crate::error::Result;

/// Build the registry of every configured provider
pub fn create_registry(config: &ProvidersConfig) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();

    registry.register(Judge0Provider::new(config.judge0.clone())?);

    match CompilerProxyProvider::from_config(&config.compiler_proxy)? {
        Some(provider) => registry.register(provider),
        None => info!("RAPIDAPI_KEY not set, compiler proxy disabled"),
    }

    registry.register(StarPatternProvider::new());
    registry.register(SimulatedProvider::new()?);

    Ok(registry)
}

/// Specialized matchers, in the order they are consulted
pub fn default_matchers() -> Vec<Box<dyn SpecializedProviderMatcher>> {
    vec![Box::new(StarPatternMatcher)]
}
