//! Configuration I/O - Loading and saving configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;

use secrecy::SecretString;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration with layered precedence:
/// 1. Config file (config.json / config.toml) if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<Config> {
    let config_path = super::paths::config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        Config::default()
    };

    dotenvy::dotenv().ok();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().map_or(false, |ext| ext == "json") {
        // Parse as JSON5 (more lenient than strict JSON)
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().map_or(false, |ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Overlay environment variables onto an existing config.
///
/// `lookup` resolves a variable name; callers normally pass
/// `|key| std::env::var(key).ok()`. Unparseable numeric values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // Server
    if let Some(port) = lookup("PORT").and_then(|v| v.parse().ok()) {
        config.server.port = port;
    }
    if let Some(bind) = lookup("BIND") {
        config.server.bind = bind;
    }
    if let Some(env) = lookup("CODERELAY_ENV").or_else(|| lookup("NODE_ENV")) {
        if let Ok(env) = env.parse() {
            config.server.environment = env;
        }
    }
    if let Some(origins) = lookup("ALLOWED_ORIGINS") {
        config.server.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }

    // Judge0
    if let Some(url) = lookup("JUDGE0_URL") {
        config.providers.judge0.base_url = url;
    }
    if let Some(token) = lookup("JUDGE0_AUTH_TOKEN") {
        config.providers.judge0.auth_token = Some(SecretString::from(token));
    }

    // Compiler proxy
    if let Some(key) = lookup("RAPIDAPI_KEY").filter(|k| !k.is_empty()) {
        config.providers.compiler_proxy.api_key = Some(SecretString::from(key));
    }
    if let Some(host) = lookup("RAPIDAPI_HOST") {
        config.providers.compiler_proxy.host = host;
    }

    // Browser
    if let Some(url) = lookup("BROWSER_URL") {
        config.providers.browser.base_url = url;
    }
    if let Some(token) = lookup("BROWSER_TOKEN") {
        config.providers.browser.token = Some(SecretString::from(token));
    }

    // Security
    if let Some(mode) = lookup("SECURITY_MODE") {
        if let Ok(mode) = mode.parse() {
            config.security.mode = mode;
        }
    }

    // Logging
    if let Some(level) = lookup("RUST_LOG") {
        config.log.level = level;
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        if let Ok(format) = format.parse() {
            config.log.format = format;
        }
    }
}

/// Save configuration to a file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = if path.extension().map_or(false, |ext| ext == "toml") {
        toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, SecurityMode};
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "8081"),
            ("NODE_ENV", "development"),
            ("ALLOWED_ORIGINS", "http://a.test, http://b.test,"),
            ("JUDGE0_URL", "http://judge.local"),
            ("RAPIDAPI_KEY", "secret-key"),
            ("SECURITY_MODE", "basic"),
            ("LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(
            config.server.allowed_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(config.providers.judge0.base_url, "http://judge.local");
        assert_eq!(
            config
                .providers
                .compiler_proxy
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().to_string()),
            Some("secret-key".to_string())
        );
        assert_eq!(config.security.mode, SecurityMode::Basic);
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.server.port = 7070;
        config.dispatch.max_attempts = 3;
        save_config(&config, &path).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.server.port, 7070);
        assert_eq!(loaded.dispatch.max_attempts, 3);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ server: ").unwrap();
        assert!(matches!(load_config_from_path(&path), Err(Error::Config(_))));
    }
}
