//! Lightweight syntax screening for the validate endpoint

use serde::{Deserialize, Serialize};

/// Outcome of a syntax check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl SyntaxReport {
    fn from_errors(errors: Vec<String>) -> Self {
        SyntaxReport {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Run the basic checks for `language`
///
/// Languages without checks always pass.
pub fn validate_syntax(code: &str, language: &str) -> SyntaxReport {
    let mut errors = Vec::new();

    match language.to_lowercase().as_str() {
        "javascript" | "typescript" | "js" | "ts" => {
            if !balanced(code, '{', '}') {
                errors.push("Unclosed braces detected".to_string());
            }
            if !balanced(code, '(', ')') {
                errors.push("Unclosed parentheses detected".to_string());
            }
        }
        "python" => {
            if has_irregular_indentation(code) {
                errors.push("Indentation error detected".to_string());
            }
        }
        _ => {}
    }

    SyntaxReport::from_errors(errors)
}

/// A closer before its opener counts as unbalanced
fn balanced(code: &str, open: char, close: char) -> bool {
    let mut depth: i64 = 0;
    for c in code.chars() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth < 0 {
                return false;
            }
        }
    }
    depth == 0
}

/// Any non-blank line indented by something other than a multiple of four
fn has_irregular_indentation(code: &str) -> bool {
    code.lines()
        .filter(|line| !line.trim().is_empty())
        .any(|line| {
            let indent = line.len() - line.trim_start().len();
            indent % 4 != 0
        })
}
