//! Core request/result types shared by the dispatcher and providers

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Terminal outcome of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Program ran to completion
    Success,
    /// Compilation, runtime, provider or security failure
    Error,
    /// Time limit or call timeout exceeded
    Timeout,
    /// Provider reported the memory limit was hit
    MemoryLimitExceeded,
    /// Compiled/linked artifact exceeded the provider's size limit
    OversizedArtifact,
}

impl ExecutionStatus {
    /// All statuses, in reporting order
    pub const ALL: [ExecutionStatus; 5] = [
        ExecutionStatus::Success,
        ExecutionStatus::Error,
        ExecutionStatus::Timeout,
        ExecutionStatus::MemoryLimitExceeded,
        ExecutionStatus::OversizedArtifact,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::MemoryLimitExceeded => "memory_limit_exceeded",
            ExecutionStatus::OversizedArtifact => "oversized_artifact",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to execute code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Lower-cased language key (e.g. `python`, `cpp`)
    pub language: String,
    /// Source code
    #[serde(rename = "code")]
    pub source: String,
    /// Standard input
    #[serde(rename = "input", default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    /// Time limit in milliseconds
    #[serde(rename = "timeLimit", default, skip_serializing_if = "Option::is_none")]
    pub time_limit_ms: Option<u64>,
    /// Memory limit in kilobytes
    #[serde(rename = "memoryLimit", default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_kb: Option<u64>,
}

impl ExecutionRequest {
    /// Create a new execution request
    pub fn new(language: impl Into<String>, source: impl Into<String>) -> Self {
        ExecutionRequest {
            language: language.into().trim().to_lowercase(),
            source: source.into(),
            stdin: None,
            time_limit_ms: None,
            memory_limit_kb: None,
        }
    }

    /// Set stdin
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// Set the time limit
    pub fn with_time_limit_ms(mut self, limit: u64) -> Self {
        self.time_limit_ms = Some(limit);
        self
    }

    /// Set the memory limit
    pub fn with_memory_limit_kb(mut self, limit: u64) -> Self {
        self.memory_limit_kb = Some(limit);
        self
    }

    /// Same request with a different source (used by retry transforms)
    pub fn with_source(&self, source: impl Into<String>) -> Self {
        ExecutionRequest {
            source: source.into(),
            ..self.clone()
        }
    }

    /// Whether non-empty stdin was supplied
    pub fn has_stdin(&self) -> bool {
        self.stdin.as_deref().map_or(false, |s| !s.is_empty())
    }

    /// Parse a JSON request body, checking field presence and types.
    ///
    /// `language` and `code` must be non-empty strings; `input` must be a
    /// string when present; `timeLimit`/`memoryLimit` must be non-negative
    /// integers when present.
    pub fn from_json(body: &Value) -> Result<Self> {
        let language = match body.get("language") {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            _ => {
                return Err(Error::Validation(
                    "Language is required and must be a string".to_string(),
                ))
            }
        };

        let source = match body.get("code") {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            _ => {
                return Err(Error::Validation(
                    "Code is required and must be a string".to_string(),
                ))
            }
        };

        let stdin = match body.get("input") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(Error::Validation("Input must be a string".to_string()));
            }
        };

        let time_limit_ms = optional_u64(body, "timeLimit")?;
        let memory_limit_kb = optional_u64(body, "memoryLimit")?;

        Ok(ExecutionRequest {
            language: language.trim().to_lowercase(),
            source: source.clone(),
            stdin,
            time_limit_ms,
            memory_limit_kb,
        })
    }
}

fn optional_u64(body: &Value, field: &str) -> Result<Option<u64>> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| Error::Validation(format!("{} must be a non-negative integer", field))),
    }
}

/// Normalized result of code execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Standard output
    #[serde(rename = "output")]
    pub stdout: String,
    /// Error text (stderr, compile output or dispatcher message)
    pub error: Option<String>,
    /// Wall-clock duration in milliseconds
    #[serde(rename = "executionTime")]
    pub duration_ms: u64,
    /// Peak memory in kilobytes as reported by the provider
    #[serde(rename = "memoryUsage")]
    pub memory_used_kb: u64,
    /// Terminal status
    pub status: ExecutionStatus,
}

impl ExecutionResult {
    /// Create a successful result
    pub fn success(stdout: impl Into<String>, memory_used_kb: u64) -> Self {
        ExecutionResult {
            stdout: stdout.into(),
            error: None,
            duration_ms: 0,
            memory_used_kb,
            status: ExecutionStatus::Success,
        }
    }

    /// Create a failed result with the given status
    pub fn failure(status: ExecutionStatus, error: impl Into<String>) -> Self {
        ExecutionResult {
            stdout: String::new(),
            error: Some(error.into()),
            duration_ms: 0,
            memory_used_kb: 0,
            status,
        }
    }

    /// Set the duration
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Whether the status is success
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_from_json() {
        let req = ExecutionRequest::from_json(&json!({
            "language": " Python ",
            "code": "print(1)",
            "input": "5",
            "timeLimit": 2000
        }))
        .unwrap();

        assert_eq!(req.language, "python");
        assert_eq!(req.stdin.as_deref(), Some("5"));
        assert_eq!(req.time_limit_ms, Some(2000));
        assert_eq!(req.memory_limit_kb, None);
        assert!(req.has_stdin());
    }

    #[test]
    fn test_request_rejects_missing_or_mistyped_fields() {
        let cases = [
            json!({ "code": "print(1)" }),
            json!({ "language": 42, "code": "print(1)" }),
            json!({ "language": "", "code": "print(1)" }),
            json!({ "language": "python" }),
            json!({ "language": "python", "code": ["x"] }),
            json!({ "language": "python", "code": "x", "input": 5 }),
            json!({ "language": "python", "code": "x", "timeLimit": -1 }),
        ];

        for body in cases {
            let err = ExecutionRequest::from_json(&body).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "accepted {}", body);
        }
    }

    #[test]
    fn test_result_wire_shape() {
        let result = ExecutionResult::failure(ExecutionStatus::OversizedArtifact, "too big")
            .with_duration_ms(12);
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["status"], "oversized_artifact");
        assert_eq!(value["executionTime"], 12);
        assert_eq!(value["output"], "");
        assert_eq!(value["error"], "too big");
        assert_eq!(value["memoryUsage"], 0);
    }
}
