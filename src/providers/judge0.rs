//! Judge0 hosted judge provider
//!
//! Submits source to a Judge0 instance and polls the submission until it
//! leaves the queue or the request's time limit runs out.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::Judge0Config;
use crate::core::{
    Capability, ExecutionProvider, ExecutionRequest, ExecutionResult, ExecutionStatus,
    ProviderDescriptor,
};
use crate::error::{Error, Result};

/// Provider name used in the registry and in `dispatch.primary_order`
pub const JUDGE0_PROVIDER: &str = "judge0";

/// Time limit used when the request does not carry one
const DEFAULT_TIME_LIMIT_MS: u64 = 10_000;

/// Judge0 language ids
const LANGUAGE_IDS: &[(&str, u32)] = &[
    ("javascript", 63),
    ("python", 71),
    ("java", 62),
    ("cpp", 54),
    ("c", 50),
    ("go", 60),
    ("rust", 73),
    ("php", 68),
    ("ruby", 72),
    ("swift", 83),
    ("kotlin", 78),
    ("typescript", 74),
];

/// First Judge0 status id that means "finished" (1 = In Queue, 2 = Processing)
const FIRST_TERMINAL_STATUS: u32 = 3;

const OVERSIZED_MESSAGE: &str = "File size limit exceeded. Your code may be too complex for the \
    current execution environment. Try simplifying your logic or using a simpler approach.";

#[derive(Debug, Serialize)]
struct SubmissionRequest<'a> {
    language_id: u32,
    source_code: &'a str,
    stdin: &'a str,
    /// Kilobytes; the instance default applies when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SubmissionToken {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmissionStatus {
    id: u32,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct Submission {
    status: Option<SubmissionStatus>,
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
    message: Option<String>,
    /// Kilobytes
    memory: Option<u64>,
}

/// Hosted judge provider backed by the Judge0 REST API
pub struct Judge0Provider {
    client: Client,
    config: Judge0Config,
    descriptor: ProviderDescriptor,
}

impl Judge0Provider {
    /// Create a new Judge0 provider
    pub fn new(config: Judge0Config) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(ref token) = config.auth_token {
            headers.insert(
                "X-Auth-Token",
                header::HeaderValue::from_str(token.expose_secret())
                    .map_err(|e| Error::Config(format!("Invalid Judge0 auth token: {}", e)))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        let descriptor = ProviderDescriptor::new(
            JUDGE0_PROVIDER,
            LANGUAGE_IDS.iter().map(|(name, _)| *name),
            &[Capability::HostedJudge],
        );

        Ok(Judge0Provider {
            client,
            config,
            descriptor,
        })
    }

    /// Judge0 language id for a language key
    pub fn language_id(language: &str) -> Option<u32> {
        LANGUAGE_IDS
            .iter()
            .find(|(name, _)| *name == language)
            .map(|(_, id)| *id)
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Submit source and return the submission token
    async fn submit(&self, language_id: u32, request: &ExecutionRequest) -> Result<String> {
        let url = format!(
            "{}/submissions/?base64_encoded=false&wait=false",
            self.base_url()
        );

        let body = SubmissionRequest {
            language_id,
            source_code: &request.source,
            stdin: request.stdin.as_deref().unwrap_or(""),
            memory_limit: request.memory_limit_kb,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::Submission(format!(
                "Judge0 returned {} on submission",
                status
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "Judge0 rejected submission with status {}: {}",
                status, text
            )));
        }

        let token: SubmissionToken = response
            .json()
            .await
            .map_err(|e| Error::Submission(format!("Failed to parse submission response: {}", e)))?;

        token
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Submission("Failed to get submission token".to_string()))
    }

    /// Poll until the submission finishes or `limit` elapses
    async fn wait_for_result(&self, token: &str, limit: Duration) -> Result<Submission> {
        let url = format!("{}/submissions/{}?base64_encoded=false", self.base_url(), token);
        let started = Instant::now();

        loop {
            if started.elapsed() >= limit {
                return Err(Error::ProviderTimeout(limit.as_millis() as u64));
            }

            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(Error::Provider(format!(
                    "Judge0 result request failed with status {}",
                    response.status()
                )));
            }

            let submission: Submission = response
                .json()
                .await
                .map_err(|e| Error::Provider(format!("Failed to parse result response: {}", e)))?;

            match submission.status {
                Some(ref s) if s.id >= FIRST_TERMINAL_STATUS => {
                    debug!(token, status = s.id, description = %s.description, "Judge0 submission finished");
                    return Ok(submission);
                }
                _ => tokio::time::sleep(self.config.poll_interval).await,
            }
        }
    }

    /// Map a Judge0 status id onto our status enum
    ///
    /// 3 Accepted, 5 Time Limit Exceeded, 7 SIGSEGV, 8 SIGXFSZ; everything
    /// else (wrong answer, compilation error, other runtime errors, internal
    /// errors) is reported as a plain error.
    pub fn map_status(status_id: Option<u32>) -> ExecutionStatus {
        match status_id {
            Some(3) => ExecutionStatus::Success,
            Some(5) => ExecutionStatus::Timeout,
            Some(7) => ExecutionStatus::MemoryLimitExceeded,
            Some(8) => ExecutionStatus::OversizedArtifact,
            _ => ExecutionStatus::Error,
        }
    }

    fn normalize(submission: Submission) -> ExecutionResult {
        let mut status = Self::map_status(submission.status.as_ref().map(|s| s.id));

        let compile_output = submission.compile_output.filter(|s| !s.is_empty());
        if status == ExecutionStatus::Error {
            if let Some(ref out) = compile_output {
                let lower = out.to_lowercase();
                if lower.contains("file size limit") || lower.contains("core dumped") {
                    status = ExecutionStatus::OversizedArtifact;
                }
            }
        }

        let error = if status == ExecutionStatus::OversizedArtifact {
            Some(OVERSIZED_MESSAGE.to_string())
        } else {
            submission
                .stderr
                .filter(|s| !s.is_empty())
                .or(compile_output)
                .or_else(|| {
                    (status != ExecutionStatus::Success)
                        .then_some(submission.message)
                        .flatten()
                })
        };

        ExecutionResult {
            stdout: submission.stdout.unwrap_or_default(),
            error,
            duration_ms: 0,
            memory_used_kb: submission.memory.unwrap_or(0),
            status,
        }
    }
}

#[async_trait]
impl ExecutionProvider for Judge0Provider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let language_id = Self::language_id(&request.language).ok_or_else(|| {
            Error::Validation(format!("Unsupported language: {}", request.language))
        })?;

        let token = self.submit(language_id, request).await?;
        debug!(language = %request.language, token = %token, "Submitted to Judge0");

        let limit = Duration::from_millis(request.time_limit_ms.unwrap_or(DEFAULT_TIME_LIMIT_MS));
        let submission = self.wait_for_result(&token, limit).await?;

        let result = Self::normalize(submission);
        if result.status == ExecutionStatus::OversizedArtifact {
            warn!(language = %request.language, "Judge0 reported an oversized artifact");
        }
        Ok(result)
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/about", self.base_url()))
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> Judge0Provider {
        Judge0Provider::new(Judge0Config {
            base_url: server.uri(),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        })
        .unwrap()
    }

    async fn mount_submission(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/submissions/"))
            .and(query_param("wait", "false"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "token": token })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Judge0Provider::map_status(Some(3)), ExecutionStatus::Success);
        assert_eq!(Judge0Provider::map_status(Some(5)), ExecutionStatus::Timeout);
        assert_eq!(
            Judge0Provider::map_status(Some(7)),
            ExecutionStatus::MemoryLimitExceeded
        );
        assert_eq!(
            Judge0Provider::map_status(Some(8)),
            ExecutionStatus::OversizedArtifact
        );
        assert_eq!(Judge0Provider::map_status(Some(6)), ExecutionStatus::Error);
        assert_eq!(Judge0Provider::map_status(Some(13)), ExecutionStatus::Error);
        assert_eq!(Judge0Provider::map_status(None), ExecutionStatus::Error);
    }

    #[test]
    fn test_language_ids() {
        assert_eq!(Judge0Provider::language_id("python"), Some(71));
        assert_eq!(Judge0Provider::language_id("cpp"), Some(54));
        assert_eq!(Judge0Provider::language_id("c++"), None);
    }

    #[tokio::test]
    async fn test_execute_polls_until_finished() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submissions/"))
            .and(body_partial_json(json!({ "language_id": 71, "stdin": "" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "token": "abc" })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/submissions/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": { "id": 2, "description": "Processing" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/submissions/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": { "id": 3, "description": "Accepted" },
                "stdout": "Health check passed\n",
                "memory": 3100
            })))
            .mount(&server)
            .await;

        let request = ExecutionRequest::new("python", "print(\"Health check passed\")");
        let result = provider(&server).execute(&request).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.stdout, "Health check passed\n");
        assert_eq!(result.memory_used_kb, 3100);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_memory_limit_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submissions/"))
            .and(body_partial_json(json!({ "language_id": 63, "memory_limit": 128000 })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "token": "mem" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/submissions/mem"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": { "id": 3, "description": "Accepted" },
                "stdout": "ok\n"
            })))
            .mount(&server)
            .await;

        let request = ExecutionRequest::new("javascript", "console.log('ok')")
            .with_memory_limit_kb(128_000);
        let result = provider(&server).execute(&request).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.stdout, "ok\n");
    }

    #[tokio::test]
    async fn test_execute_reports_compile_error() {
        let server = MockServer::start().await;
        mount_submission(&server, "t1").await;
        Mock::given(method("GET"))
            .and(path("/submissions/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": { "id": 6, "description": "Compilation Error" },
                "compile_output": "main.cpp:1: error: expected ';'"
            })))
            .mount(&server)
            .await;

        let request = ExecutionRequest::new("cpp", "int main() { return 0 }");
        let result = provider(&server).execute(&request).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.error.as_deref(), Some("main.cpp:1: error: expected ';'"));
    }

    #[tokio::test]
    async fn test_compile_output_file_size_limit_is_oversized() {
        let server = MockServer::start().await;
        mount_submission(&server, "t2").await;
        Mock::given(method("GET"))
            .and(path("/submissions/t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": { "id": 6, "description": "Compilation Error" },
                "compile_output": "ld: File size limit exceeded (core dumped)"
            })))
            .mount(&server)
            .await;

        let request = ExecutionRequest::new("cpp", "int main() {}");
        let result = provider(&server).execute(&request).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::OversizedArtifact);
        assert!(result.error.unwrap().starts_with("File size limit exceeded"));
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let server = MockServer::start().await;
        mount_submission(&server, "slow").await;
        Mock::given(method("GET"))
            .and(path("/submissions/slow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": { "id": 1, "description": "In Queue" }
            })))
            .mount(&server)
            .await;

        let request = ExecutionRequest::new("python", "print(1)").with_time_limit_ms(50);
        let err = provider(&server).execute(&request).await.unwrap_err();

        assert!(matches!(err, Error::ProviderTimeout(50)));
    }

    #[tokio::test]
    async fn test_missing_token_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submissions/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .mount(&server)
            .await;

        let request = ExecutionRequest::new("python", "print(1)");
        let err = provider(&server).execute(&request).await.unwrap_err();

        assert!(matches!(err, Error::Submission(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submissions/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let request = ExecutionRequest::new("python", "print(1)");
        let err = provider(&server).execute(&request).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_auth_token_header_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .and(wiremock::matchers::header("X-Auth-Token", "s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "1.13" })))
            .mount(&server)
            .await;

        let provider = Judge0Provider::new(Judge0Config {
            base_url: server.uri(),
            auth_token: Some(secrecy::SecretString::from("s3cret")),
            ..Default::default()
        })
        .unwrap();

        assert!(provider.health_check().await.unwrap());
    }
}
