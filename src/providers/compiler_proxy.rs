//! RapidAPI online compiler proxy
//!
//! Single request/response back-end. Registered only when an API key is
//! configured.

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CompilerProxyConfig;
use crate::core::{
    Capability, ExecutionProvider, ExecutionRequest, ExecutionResult, ExecutionStatus,
    ProviderDescriptor,
};
use crate::error::{Error, Result};

/// Provider name used in the registry and in `dispatch.primary_order`
pub const COMPILER_PROXY_PROVIDER: &str = "compiler-proxy";

/// Our language key → the proxy's language name
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("javascript", "nodejs"),
    ("python", "python3"),
    ("java", "java"),
    ("cpp", "cpp"),
    ("c", "c"),
    ("go", "go"),
    ("rust", "rust"),
    ("php", "php"),
    ("ruby", "ruby"),
    ("swift", "swift"),
    ("kotlin", "kotlin"),
];

#[derive(Debug, Serialize)]
struct CompileRequest<'a> {
    language: &'a str,
    version: &'a str,
    code: &'a str,
    input: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CompileResponse {
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Compiler proxy provider
pub struct CompilerProxyProvider {
    client: Client,
    base_url: String,
    descriptor: ProviderDescriptor,
}

impl CompilerProxyProvider {
    /// Create a provider, or `None` when no API key is configured
    pub fn from_config(config: &CompilerProxyConfig) -> Result<Option<Self>> {
        match config.api_key {
            Some(ref key) if !key.expose_secret().is_empty() => {
                Self::new(config, key.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Create a provider with an explicit key
    pub fn new(config: &CompilerProxyConfig, api_key: SecretString) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "x-rapidapi-key",
            header::HeaderValue::from_str(api_key.expose_secret())
                .map_err(|e| Error::Config(format!("Invalid RapidAPI key: {}", e)))?,
        );
        headers.insert(
            "x-rapidapi-host",
            header::HeaderValue::from_str(&config.host)
                .map_err(|e| Error::Config(format!("Invalid RapidAPI host: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(CompilerProxyProvider {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            descriptor: ProviderDescriptor::new(
                COMPILER_PROXY_PROVIDER,
                LANGUAGE_NAMES.iter().map(|(key, _)| *key),
                &[Capability::CompilerProxy],
            ),
        })
    }

    /// Proxy language name for a language key
    pub fn api_language(language: &str) -> &str {
        LANGUAGE_NAMES
            .iter()
            .find(|(key, _)| *key == language)
            .map(|(_, name)| *name)
            .unwrap_or(language)
    }
}

#[async_trait]
impl ExecutionProvider for CompilerProxyProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let body = CompileRequest {
            language: Self::api_language(&request.language),
            version: "latest",
            code: &request.source,
            input: request.stdin.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/v1/", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Error::Submission(format!(
                "Compiler proxy returned {}",
                status
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "Compiler proxy error ({}): {}",
                status, text
            )));
        }

        let parsed: CompileResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("API response parsing failed: {}", e)))?;

        debug!(language = %request.language, has_error = parsed.error.is_some(), "Compiler proxy responded");

        let error = parsed.error.filter(|e| !e.is_empty());
        Ok(ExecutionResult {
            stdout: parsed.output.unwrap_or_default(),
            status: if error.is_some() {
                ExecutionStatus::Error
            } else {
                ExecutionStatus::Success
            },
            error,
            duration_ms: 0,
            memory_used_kb: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> CompilerProxyConfig {
        CompilerProxyConfig {
            api_key: Some(SecretString::from("key-123")),
            base_url: Some(server.uri()),
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_without_key() {
        let provider = CompilerProxyProvider::from_config(&CompilerProxyConfig::default()).unwrap();
        assert!(provider.is_none());
    }

    #[test]
    fn test_language_names() {
        assert_eq!(CompilerProxyProvider::api_language("javascript"), "nodejs");
        assert_eq!(CompilerProxyProvider::api_language("python"), "python3");
        assert_eq!(CompilerProxyProvider::api_language("go"), "go");
    }

    #[tokio::test]
    async fn test_execute_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/"))
            .and(header("x-rapidapi-key", "key-123"))
            .and(header("x-rapidapi-host", "online-code-compiler.p.rapidapi.com"))
            .and(body_json(json!({
                "language": "python3",
                "version": "latest",
                "code": "print(input())",
                "input": "hi"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "output": "hi\n" })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = CompilerProxyProvider::from_config(&config(&server))
            .unwrap()
            .unwrap();
        let request = ExecutionRequest::new("python", "print(input())").with_stdin("hi");
        let result = provider.execute(&request).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.stdout, "hi\n");
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_execute_reports_program_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": "",
                "error": "NameError: name 'x' is not defined"
            })))
            .mount(&server)
            .await;

        let provider = CompilerProxyProvider::from_config(&config(&server))
            .unwrap()
            .unwrap();
        let result = provider
            .execute(&ExecutionRequest::new("python", "print(x)"))
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.error.unwrap().contains("NameError"));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let provider = CompilerProxyProvider::from_config(&config(&server))
            .unwrap()
            .unwrap();
        let err = provider
            .execute(&ExecutionRequest::new("python", "print(1)"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider(_)));
        assert!(!err.is_retryable());
    }
}
