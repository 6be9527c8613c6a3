//! Security pre-filter
//!
//! Screens source text against deny-listed patterns before any provider is
//! contacted. This is advisory screening only; isolation is the job of the
//! provider's own sandbox.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::warn;

use crate::config::SecurityMode;
use crate::error::{Error, Result};

/// A rejected source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityViolation {
    /// Human-readable description of the matched pattern
    pub pattern: String,
    /// Reason reported to the caller
    pub reason: String,
}

impl std::fmt::Display for SecurityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for SecurityViolation {}

impl From<SecurityViolation> for Error {
    fn from(violation: SecurityViolation) -> Self {
        Error::SecurityRejection(violation.reason)
    }
}

/// Which languages a rule applies to (`None` means all)
type Scope = Option<&'static [&'static str]>;

struct RuleSpec {
    scope: Scope,
    pattern: &'static str,
    description: &'static str,
    case_insensitive: bool,
}

const fn rule(scope: Scope, pattern: &'static str, description: &'static str) -> RuleSpec {
    RuleSpec {
        scope,
        pattern,
        description,
        case_insensitive: true,
    }
}

const fn exact(scope: Scope, pattern: &'static str, description: &'static str) -> RuleSpec {
    RuleSpec {
        scope,
        pattern,
        description,
        case_insensitive: false,
    }
}

const JS: Scope = Some(&["javascript", "js", "typescript", "ts"]);
const PYTHON: Scope = Some(&["python", "py"]);
const NATIVE: Scope = Some(&["c", "cpp", "c++"]);
const JAVA: Scope = Some(&["java", "kotlin"]);
const GO: Scope = Some(&["go"]);
const RUST: Scope = Some(&["rust"]);
const PHP: Scope = Some(&["php"]);
const RUBY: Scope = Some(&["ruby"]);

const BASIC_RULES: &[RuleSpec] = &[
    rule(None, r#"require\s*\(\s*['"`]fs['"`]\s*\)"#, "require('fs')"),
    rule(
        None,
        r#"require\s*\(\s*['"`]child_process['"`]\s*\)"#,
        "require('child_process')",
    ),
    rule(None, r"\beval\s*\(", "eval("),
];

const STRICT_RULES: &[RuleSpec] = &[
    // common
    rule(None, r"while\s*\(\s*true\s*\)", "while(true)"),
    rule(None, r"for\s*\(\s*;\s*;\s*\)", "for(;;)"),
    rule(None, r"\beval\s*\(", "eval("),
    // javascript / typescript
    exact(JS, r"\bFunction\s*\(", "Function("),
    rule(JS, r#"require\s*\(\s*['"`]fs['"`]\s*\)"#, "require('fs')"),
    rule(
        JS,
        r#"require\s*\(\s*['"`]child_process['"`]\s*\)"#,
        "require('child_process')",
    ),
    rule(JS, r"import\s+fs\b", "import fs"),
    rule(JS, r"import\s+child_process\b", "import child_process"),
    rule(JS, r"process\.exit", "process.exit"),
    rule(JS, r"process\.kill", "process.kill"),
    rule(JS, r"__dirname", "__dirname"),
    rule(JS, r"__filename", "__filename"),
    rule(JS, r"\bfs\.", "fs."),
    rule(JS, r"child_process\.", "child_process."),
    // python
    rule(PYTHON, r"__import__", "__import__"),
    rule(PYTHON, r"import\s+os\b", "import os"),
    rule(PYTHON, r"import\s+subprocess\b", "import subprocess"),
    rule(PYTHON, r"import\s+sys\b", "import sys"),
    rule(PYTHON, r"os\.system", "os.system"),
    rule(PYTHON, r"os\.popen", "os.popen"),
    rule(PYTHON, r"subprocess\.", "subprocess."),
    exact(PYTHON, r"while\s+True\s*:", "while True:"),
    // c / c++
    rule(NATIVE, r"\bsystem\s*\(", "system("),
    rule(NATIVE, r"\bpopen\s*\(", "popen("),
    rule(NATIVE, r"\bfork\s*\(", "fork("),
    rule(NATIVE, r"while\s*\(\s*1\s*\)", "while(1)"),
    // jvm
    exact(JAVA, r"Runtime\.getRuntime", "Runtime.getRuntime"),
    exact(JAVA, r"\bProcessBuilder\b", "ProcessBuilder"),
    // go
    rule(GO, r#""os/exec""#, "os/exec"),
    rule(GO, r#""syscall""#, "syscall"),
    // rust
    rule(RUST, r"std::process", "std::process"),
    exact(RUST, r"\bunsafe\b", "unsafe"),
    // php
    rule(PHP, r"\bshell_exec\s*\(", "shell_exec("),
    rule(PHP, r"\bexec\s*\(", "exec("),
    rule(PHP, r"\bpassthru\s*\(", "passthru("),
    rule(PHP, r"\bsystem\s*\(", "system("),
    // ruby
    rule(RUBY, r"\bsystem\s*\(", "system("),
    rule(RUBY, r"`[^`]*`", "backtick exec"),
    rule(RUBY, r"IO\.popen", "IO.popen"),
];

struct CompiledRule {
    scope: Scope,
    regex: Regex,
    description: &'static str,
}

impl CompiledRule {
    fn applies_to(&self, language: &str) -> bool {
        self.scope.map_or(true, |langs| langs.contains(&language))
    }
}

/// Deny-list based source screen
pub struct SecurityFilter {
    mode: SecurityMode,
    rules: Vec<CompiledRule>,
}

impl SecurityFilter {
    /// Compile the rule set for a mode
    pub fn new(mode: SecurityMode) -> Result<Self> {
        let specs = match mode {
            SecurityMode::Basic => BASIC_RULES,
            SecurityMode::Strict => STRICT_RULES,
        };

        let rules = specs
            .iter()
            .map(|spec| {
                let regex = RegexBuilder::new(spec.pattern)
                    .case_insensitive(spec.case_insensitive)
                    .build()
                    .map_err(|e| {
                        Error::Internal(format!("Invalid security pattern {}: {}", spec.pattern, e))
                    })?;
                Ok(CompiledRule {
                    scope: spec.scope,
                    regex,
                    description: spec.description,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SecurityFilter { mode, rules })
    }

    /// Active mode
    pub fn mode(&self) -> SecurityMode {
        self.mode
    }

    /// Number of compiled rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Screen `source` for `language`; first matching rule wins
    pub fn check(&self, language: &str, source: &str) -> std::result::Result<(), SecurityViolation> {
        let language = language.to_lowercase();

        for rule in self.rules.iter().filter(|r| r.applies_to(&language)) {
            if rule.regex.is_match(source) {
                warn!(language = %language, pattern = rule.description, "Source rejected by security filter");
                return Err(SecurityViolation {
                    pattern: rule.description.to_string(),
                    reason: format!(
                        "Code contains potentially dangerous pattern: {}",
                        rule.description
                    ),
                });
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for SecurityFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityFilter")
            .field("mode", &self.mode)
            .field("rules", &self.rules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> SecurityFilter {
        SecurityFilter::new(SecurityMode::Strict).unwrap()
    }

    #[test]
    fn test_common_patterns_apply_to_every_language() {
        let filter = strict();
        for language in ["python", "javascript", "cpp", "go", "swift"] {
            assert!(filter.check(language, "while (true) {}").is_err(), "{}", language);
            assert!(filter.check(language, "for(;;){}").is_err(), "{}", language);
            assert!(filter.check(language, "eval('1+1')").is_err(), "{}", language);
        }
    }

    #[test]
    fn test_language_specific_patterns() {
        let filter = strict();

        let err = filter
            .check("javascript", "const fs = require('fs');")
            .unwrap_err();
        assert_eq!(err.pattern, "require('fs')");
        assert!(err.reason.contains("require('fs')"));

        assert!(filter.check("python", "import os\nos.listdir('.')").is_err());
        assert!(filter.check("python", "while True:\n    pass").is_err());
        assert!(filter.check("cpp", "int main(){ system(\"ls\"); }").is_err());
        assert!(filter
            .check("java", "Runtime.getRuntime().exec(\"ls\");")
            .is_err());
        assert!(filter.check("go", "import \"os/exec\"").is_err());
        assert!(filter.check("rust", "unsafe { *ptr }").is_err());
        assert!(filter.check("php", "<?php shell_exec('ls'); ?>").is_err());
        assert!(filter.check("ruby", "puts `ls`").is_err());
    }

    #[test]
    fn test_rules_are_scoped_by_language() {
        let filter = strict();
        // `import os` is only a concern for python
        assert!(filter.check("go", "import os").is_ok());
        // `unsafe` is only a concern for rust
        assert!(filter.check("python", "print('unsafe')").is_ok());
    }

    #[test]
    fn test_ordinary_programs_pass() {
        let filter = strict();
        assert!(filter.check("python", "print(\"Health check passed\")").is_ok());
        assert!(filter
            .check("javascript", "const add = function (a, b) { return a + b; };\nconsole.log(add(1, 2));")
            .is_ok());
        assert!(filter
            .check(
                "cpp",
                "#include <iostream>\nint main() { for (int i = 0; i < 3; i++) std::cout << i; }"
            )
            .is_ok());
    }

    #[test]
    fn test_basic_mode_is_narrower() {
        let filter = SecurityFilter::new(SecurityMode::Basic).unwrap();
        assert!(filter.rule_count() < strict().rule_count());
        assert!(filter.check("python", "import os").is_ok());
        assert!(filter.check("javascript", "while(true){}").is_ok());
        assert!(filter.check("javascript", "require(\"child_process\")").is_err());
        assert!(filter.check("python", "eval('2')").is_err());
    }

    #[test]
    fn test_violation_converts_to_error() {
        let violation = strict().check("python", "__import__('os')").unwrap_err();
        let err: Error = violation.into();
        assert!(err.is_client_error());
        assert_eq!(
            err.to_string(),
            "Security violation: Code contains potentially dangerous pattern: __import__"
        );
    }
}
