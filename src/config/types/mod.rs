//! Configuration types module
//!
//! Re-exports all configuration types.

pub mod dispatch;
pub mod provider;
pub mod server;

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: server::ServerConfig,

    /// Dispatcher limits and retry policy
    #[serde(default)]
    pub dispatch: dispatch::DispatchConfig,

    /// Execution and rendering back-ends
    #[serde(default)]
    pub providers: provider::ProvidersConfig,

    /// Security pre-filter
    #[serde(default)]
    pub security: dispatch::SecurityConfig,

    /// Preview composition
    #[serde(default)]
    pub preview: dispatch::PreviewConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: server::LogConfig,
}

impl Config {
    /// Load configuration from defaults, the config file (if present) and
    /// environment variable overrides
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config()
    }
}
