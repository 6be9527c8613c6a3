//! Simulated fallback provider
//!
//! Answers without running anything: it echoes the first string literal a
//! program prints, or a per-language "executed" line. The dispatcher uses it
//! only after the primary reports an oversized artifact.

use async_trait::async_trait;
use regex::Regex;

use super::star_pattern;
use crate::core::{
    Capability, ExecutionProvider, ExecutionRequest, ExecutionResult, ExecutionStatus,
    ProviderDescriptor,
};
use crate::error::{Error, Result};

/// Provider name used in the registry
pub const SIMULATED_PROVIDER: &str = "simulated";

const UNSAFE_MESSAGE: &str =
    "Code contains potentially unsafe patterns. Please use standard library functions only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Python,
    JavaScript,
    Cpp,
    Java,
}

impl Flavor {
    fn of(language: &str) -> Option<Self> {
        match language {
            "python" => Some(Flavor::Python),
            "javascript" | "js" => Some(Flavor::JavaScript),
            "cpp" | "c++" => Some(Flavor::Cpp),
            "java" => Some(Flavor::Java),
            _ => None,
        }
    }

    fn memory_kb(self) -> u64 {
        match self {
            Flavor::Python => 1024,
            Flavor::JavaScript => 512,
            Flavor::Cpp => 2048,
            Flavor::Java => 4096,
        }
    }

    fn executed_line(self) -> &'static str {
        match self {
            Flavor::Python => "Python code executed (simulated)\n",
            Flavor::JavaScript => "JavaScript code executed (simulated)\n",
            Flavor::Cpp => "C++ code compiled and executed (simulated)\n",
            Flavor::Java => "Java code executed (simulated)\n",
        }
    }
}

/// Fallback provider that simulates execution of simple programs
pub struct SimulatedProvider {
    descriptor: ProviderDescriptor,
    output_call: Regex,
    python_literal: Regex,
    javascript_literal: Regex,
    cpp_literal: Regex,
    java_literal: Regex,
}

impl SimulatedProvider {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| Error::Internal(format!("Invalid simulator pattern: {}", e)))
        };

        Ok(SimulatedProvider {
            descriptor: ProviderDescriptor::new(
                SIMULATED_PROVIDER,
                ["python", "javascript", "js", "cpp", "c++", "java"],
                &[Capability::Fallback],
            ),
            output_call: compile(
                r"(?i)print\s*\(|console\.log\s*\(|cout\s*<<|System\.out\.print",
            )?,
            python_literal: compile(r#"print\s*\(\s*['"]([^'"]*)['"]\s*\)"#)?,
            javascript_literal: compile(r#"console\.log\s*\(\s*['"]([^'"]*)['"]\s*\)"#)?,
            cpp_literal: compile(r#"cout\s*<<\s*['"]([^'"]*)['"]"#)?,
            java_literal: compile(r#"System\.out\.print(?:ln)?\s*\(\s*['"]([^'"]*)['"]\s*\)"#)?,
        })
    }

    fn literal_pattern(&self, flavor: Flavor) -> &Regex {
        match flavor {
            Flavor::Python => &self.python_literal,
            Flavor::JavaScript => &self.javascript_literal,
            Flavor::Cpp => &self.cpp_literal,
            Flavor::Java => &self.java_literal,
        }
    }

    fn simulate(&self, flavor: Flavor, request: &ExecutionRequest) -> ExecutionResult {
        let memory = flavor.memory_kb();

        if let Some(literal) = self
            .literal_pattern(flavor)
            .captures(&request.source)
            .and_then(|c| c.get(1))
        {
            return ExecutionResult::success(format!("{}\n", literal.as_str()), memory);
        }

        if flavor == Flavor::Cpp && star_pattern::is_star_pattern(&request.source) {
            let rows = star_pattern::parse_rows(request.stdin.as_deref());
            return ExecutionResult::success(star_pattern::render(rows), memory);
        }

        ExecutionResult::success(flavor.executed_line(), memory)
    }
}

#[async_trait]
impl ExecutionProvider for SimulatedProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        if !self.output_call.is_match(&request.source) {
            return Ok(ExecutionResult::failure(
                ExecutionStatus::Error,
                UNSAFE_MESSAGE,
            ));
        }

        match Flavor::of(&request.language) {
            Some(flavor) => Ok(self.simulate(flavor, request)),
            None => Ok(ExecutionResult::failure(
                ExecutionStatus::Error,
                format!("Language {} not supported by alternative service", request.language),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(language: &str, source: &str) -> ExecutionResult {
        SimulatedProvider::new()
            .unwrap()
            .execute(&ExecutionRequest::new(language, source))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_echoes_first_literal() {
        let result = run("python", "print('hello')\nprint('world')").await;
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.memory_used_kb, 1024);

        let result = run("js", "console.log(\"hi\")").await;
        assert_eq!(result.stdout, "hi\n");
        assert_eq!(result.memory_used_kb, 512);

        let result = run("java", "System.out.println(\"Hello, Java\");").await;
        assert_eq!(result.stdout, "Hello, Java\n");
        assert_eq!(result.memory_used_kb, 4096);
    }

    #[tokio::test]
    async fn test_generic_line_when_no_literal() {
        let result = run("cpp", "int main() { int x = 2; std::cout << x; }").await;
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.stdout, "C++ code compiled and executed (simulated)\n");
        assert_eq!(result.memory_used_kb, 2048);
    }

    #[tokio::test]
    async fn test_cpp_star_pattern_uses_row_count() {
        let provider = SimulatedProvider::new().unwrap();
        let source = "// star pattern\nfor (int i = 0; i < n; i++) std::cout << x * 1;";
        let request = ExecutionRequest::new("cpp", source).with_stdin("2");

        let result = provider.execute(&request).await.unwrap();
        assert_eq!(result.stdout, "* \n* * \n");
    }

    #[tokio::test]
    async fn test_rejects_source_without_output_call() {
        let result = run("python", "x = 1 + 1").await;
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.error.as_deref(), Some(UNSAFE_MESSAGE));
    }

    #[test]
    fn test_descriptor() {
        let provider = SimulatedProvider::new().unwrap();
        assert!(provider.descriptor().has(Capability::Fallback));
        assert!(provider.supports_language("c++"));
        assert!(!provider.supports_language("go"));
    }
}
