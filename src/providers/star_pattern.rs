//! Star pattern provider
//!
//! Local, deterministic substitute for the classic "print a triangle of
//! stars" C++ exercise. The request never leaves the process.

use async_trait::async_trait;

use crate::core::{
    Capability, ExecutionProvider, ExecutionRequest, ExecutionResult, ProviderDescriptor,
};
use crate::dispatch::SpecializedProviderMatcher;
use crate::error::Result;

/// Provider name used in the registry
pub const STAR_PATTERN_PROVIDER: &str = "star-pattern";

/// Rows printed when stdin carries no number
pub const DEFAULT_ROWS: usize = 5;

/// Upper bound on rows
pub const MAX_ROWS: usize = 20;

/// Reported memory usage
const MEMORY_KB: u64 = 2048;

/// Whether a source looks like a star-pattern exercise
pub fn is_star_pattern(source: &str) -> bool {
    let lower = source.to_lowercase();
    lower.contains("star pattern") && lower.contains("for") && lower.contains('*')
}

/// Row count from stdin: leading integer of the trimmed text, clamped to
/// `[1, MAX_ROWS]`, `DEFAULT_ROWS` when there is none
pub fn parse_rows(stdin: Option<&str>) -> usize {
    match stdin.and_then(leading_int) {
        Some(n) => n.clamp(1, MAX_ROWS as i64) as usize,
        None => DEFAULT_ROWS,
    }
}

fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    // more digits than fit in an i64 still means "a lot of rows"
    let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}

/// Render `rows` rows; row `i` is `"* "` repeated `i` times plus a newline
pub fn render(rows: usize) -> String {
    let mut out = String::with_capacity(rows * (rows + 1) + rows);
    for i in 1..=rows {
        out.push_str(&"* ".repeat(i));
        out.push('\n');
    }
    out
}

/// Specialized provider for star-pattern sources
pub struct StarPatternProvider {
    descriptor: ProviderDescriptor,
}

impl StarPatternProvider {
    pub fn new() -> Self {
        StarPatternProvider {
            descriptor: ProviderDescriptor::new(
                STAR_PATTERN_PROVIDER,
                ["cpp", "c++"],
                &[Capability::Specialized],
            ),
        }
    }
}

impl Default for StarPatternProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionProvider for StarPatternProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let rows = parse_rows(request.stdin.as_deref());
        Ok(ExecutionResult::success(render(rows), MEMORY_KB))
    }
}

/// Routes star-pattern sources to [`StarPatternProvider`]
#[derive(Debug, Default, Clone, Copy)]
pub struct StarPatternMatcher;

impl SpecializedProviderMatcher for StarPatternMatcher {
    fn provider_name(&self) -> &str {
        STAR_PATTERN_PROVIDER
    }

    fn matches(&self, request: &ExecutionRequest) -> bool {
        is_star_pattern(&request.source)
    }
}
