//! Configuration module
//!
//! - types/mod.rs: Root `Config`
//! - types/server.rs: HTTP server, rate limit and logging configuration
//! - types/dispatch.rs: Dispatcher, security and preview configuration
//! - types/provider.rs: Execution and browser back-end configuration
//! - io.rs: Configuration loading and saving
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

pub use types::Config;

pub use types::server::{Environment, LogConfig, LogFormat, RateLimitConfig, ServerConfig};

pub use types::dispatch::{DispatchConfig, PreviewConfig, SecurityConfig, SecurityMode};

pub use types::provider::{BrowserConfig, CompilerProxyConfig, Judge0Config, ProvidersConfig};

pub use io::{apply_env_overrides, load_config, load_config_from_path, save_config};
pub use paths::{config_dir, config_path};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
