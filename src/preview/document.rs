//! Preview document composition and iframe embedding

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::console::bridge_script;
use crate::config::PreviewConfig;
use crate::error::{Error, Result};

const RESET_CSS: &str = "\
* { margin: 0; padding: 0; box-sizing: border-box; }
html, body { height: 100%; width: 100%; overflow-x: hidden; -webkit-text-size-adjust: 100%; }
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.5; color: #333; background: #ffffff; }";

const STYLE_PATTERN: &str = r"<style\b[^>]*>(.*?)</style\s*>";
const BODY_PATTERN: &str = r"<body\b[^>]*>(.*)</body\s*>";
const WRAPPER_PATTERN: &str = r"<!doctype[^>]*>|</?html\b[^>]*>|<head\b[^>]*>.*?</head\s*>";
const OPAQUE_PATTERN: &str = r"<script\b[^>]*>.*?</script\s*>|<!--.*?-->";
const SCRIPT_CLOSE_PATTERN: &str = r"</(script)";
const STYLE_CLOSE_PATTERN: &str = r"</(style)";

/// Delimits placeholders for masked regions (Unicode private use)
const MASK: char = '\u{E000}';

/// Caller-supplied preview input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSource {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub javascript: String,
}

impl PreviewSource {
    pub fn new(html: impl Into<String>) -> Self {
        PreviewSource {
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = css.into();
        self
    }

    pub fn with_javascript(mut self, javascript: impl Into<String>) -> Self {
        self.javascript = javascript.into();
        self
    }

    /// Combined size in bytes
    pub fn len(&self) -> usize {
        self.html.len() + self.css.len() + self.javascript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Composition options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Document title
    pub title: String,
    /// Inject the console bridge script
    pub console_bridge: bool,
    /// Largest accepted `PreviewSource::len`
    pub max_source_bytes: usize,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self::from_config(&PreviewConfig::default())
    }
}

impl ComposeOptions {
    pub fn from_config(config: &PreviewConfig) -> Self {
        ComposeOptions {
            title: "HTML Preview".to_string(),
            console_bridge: config.console_bridge,
            max_source_bytes: config.max_source_bytes,
        }
    }
}

/// A complete, self-contained HTML document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewDocument(String);

impl PreviewDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// `<iframe>` element carrying this document in `srcdoc`
    pub fn to_iframe(&self, policy: &SandboxPolicy, title: &str) -> String {
        format!(
            r#"<iframe sandbox="{}" title="{}" srcdoc="{}"></iframe>"#,
            policy,
            escape_html(title),
            escape_html(&self.0)
        )
    }
}

impl fmt::Display for PreviewDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capabilities granted to the preview iframe
///
/// Top-level navigation and plugins cannot be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxToken {
    AllowScripts,
    AllowSameOrigin,
    AllowForms,
    AllowModals,
    AllowPopups,
}

impl SandboxToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxToken::AllowScripts => "allow-scripts",
            SandboxToken::AllowSameOrigin => "allow-same-origin",
            SandboxToken::AllowForms => "allow-forms",
            SandboxToken::AllowModals => "allow-modals",
            SandboxToken::AllowPopups => "allow-popups",
        }
    }
}

/// Value of the iframe `sandbox` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    tokens: BTreeSet<SandboxToken>,
}

impl SandboxPolicy {
    /// No capabilities at all
    pub fn locked() -> Self {
        SandboxPolicy {
            tokens: BTreeSet::new(),
        }
    }

    pub fn with(mut self, token: SandboxToken) -> Self {
        self.tokens.insert(token);
        self
    }

    pub fn allows(&self, token: SandboxToken) -> bool {
        self.tokens.contains(&token)
    }
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::locked()
            .with(SandboxToken::AllowScripts)
            .with(SandboxToken::AllowSameOrigin)
    }
}

impl fmt::Display for SandboxPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.tokens.iter().map(|t| t.as_str()).collect();
        f.write_str(&tokens.join(" "))
    }
}

fn pattern(source: &str) -> Result<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| Error::Internal(format!("Invalid preview pattern: {}", e)))
}

/// Escape text for use in HTML content or a quoted attribute
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Compose a self-contained preview document
///
/// Every `<style>` block in the caller HTML (outside scripts and comments) is lifted into the single head
/// `<style>` block, after the reset rules and before the caller CSS. Caller
/// JS runs from a `<script>` at the end of the body.
pub fn compose(source: &PreviewSource, options: &ComposeOptions) -> Result<PreviewDocument> {
    if source.len() > options.max_source_bytes {
        return Err(Error::Validation(format!(
            "Preview source exceeds maximum size of {} bytes",
            options.max_source_bytes
        )));
    }

    let (masked, regions) = mask_opaque(&source.html)?;

    let style_re = pattern(STYLE_PATTERN)?;
    let extracted: Vec<&str> = style_re
        .captures_iter(&masked)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|css| !css.is_empty())
        .collect();
    let without_styles = style_re.replace_all(&masked, "");

    let body = match pattern(BODY_PATTERN)?.captures(&without_styles) {
        Some(c) => c.get(1).map_or("", |m| m.as_str()).to_string(),
        None => pattern(WRAPPER_PATTERN)?
            .replace_all(&without_styles, "")
            .into_owned(),
    };
    let body = unmask(&body, &regions)?;

    let mut css = String::from(RESET_CSS);
    for block in extracted.iter().copied().chain(Some(source.css.trim())) {
        if !block.is_empty() {
            css.push('\n');
            css.push_str(&escape_closing(&unmask(block, &regions)?, STYLE_CLOSE_PATTERN)?);
        }
    }

    let mut doc = String::with_capacity(source.len() + RESET_CSS.len() + 1024);
    doc.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    doc.push_str("<meta charset=\"UTF-8\">\n");
    doc.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    doc.push_str(&format!("<title>{}</title>\n", escape_html(&options.title)));
    doc.push_str(&format!("<style>\n{}\n</style>\n", css));
    if options.console_bridge {
        doc.push_str(&format!("<script>\n{}\n</script>\n", bridge_script()));
    }
    doc.push_str("</head>\n<body>\n");
    doc.push_str(body.trim());
    doc.push('\n');
    let javascript = source.javascript.trim();
    if !javascript.is_empty() {
        doc.push_str(&format!(
            "<script>\n{}\n</script>\n",
            escape_closing(javascript, SCRIPT_CLOSE_PATTERN)?
        ));
    }
    doc.push_str("</body>\n</html>\n");

    Ok(PreviewDocument(doc))
}

/// Swap `<script>` elements and comments for numbered placeholders so the
/// style and wrapper patterns only see markup
fn mask_opaque(html: &str) -> Result<(String, Vec<String>)> {
    let mut regions = Vec::new();
    let masked = pattern(OPAQUE_PATTERN)?
        .replace_all(html, |c: &regex::Captures<'_>| {
            regions.push(c[0].to_string());
            format!("{MASK}{}{MASK}", regions.len() - 1)
        })
        .into_owned();
    Ok((masked, regions))
}

fn unmask(text: &str, regions: &[String]) -> Result<String> {
    if regions.is_empty() {
        return Ok(text.to_string());
    }
    let placeholder = pattern(&format!("{MASK}(\\d+){MASK}"))?;
    Ok(placeholder
        .replace_all(text, |c: &regex::Captures<'_>| {
            c[1].parse::<usize>()
                .ok()
                .and_then(|i| regions.get(i))
                .map_or("", String::as_str)
                .to_string()
        })
        .into_owned())
}

/// `</script` → `<\/script` (and likewise for style) so caller code cannot
/// close the element it is embedded in
fn escape_closing(code: &str, closing: &str) -> Result<String> {
    Ok(pattern(closing)?.replace_all(code, r"<\/$1").into_owned())
}

/// Minimal document shown when composition or loading fails
pub fn error_document(message: &str) -> PreviewDocument {
    PreviewDocument(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>Error</title>\n\
         <style>\nbody {{ font-family: Arial, sans-serif; padding: 20px; color: red; }}\n\
         .error {{ background: #ffe6e6; padding: 10px; border-radius: 5px; }}\n</style>\n\
         </head>\n<body>\n<div class=\"error\">\n<h3>Error Loading HTML:</h3>\n<p>{}</p>\n</div>\n\
         </body>\n</html>\n",
        escape_html(message)
    ))
}
