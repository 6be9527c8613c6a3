//! Web engine - Server-side rendering of HTML/CSS/JS or a URL
//!
//! The page is rendered by a remote headless browser behind the
//! `WebRenderer` trait. The result carries a PNG screenshot as a data URL
//! and the serialized DOM.

mod browserless;

pub use browserless::BrowserlessRenderer;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::BrowserConfig;
use crate::error::{Error, Result};
use crate::preview::{compose, ComposeOptions, PreviewSource};

/// Inputs the engine can render
pub const TECHNOLOGIES: [&str; 4] = ["html", "css", "javascript", "url"];

/// Shortest navigation timeout sent to the browser; zero would disable it
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Browser viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// What to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    /// Complete HTML document
    Html(String),
    /// Address to navigate to
    Url(String),
}

/// One browser render
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub target: RenderTarget,
    pub viewport: Viewport,
    pub timeout: Duration,
}

/// Browser output
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub screenshot_png: Vec<u8>,
    pub html: String,
    pub url: Option<String>,
}

/// Headless browser back-end
#[async_trait]
pub trait WebRenderer: Send + Sync {
    async fn render(&self, job: &RenderJob) -> Result<RenderedPage>;

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// `POST /api/web-engine/execute` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebExecutionRequest {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub javascript: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    /// Milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().map_or(false, |s| !s.is_empty())
}

impl WebExecutionRequest {
    /// Whether none of html, css, javascript or url was supplied
    pub fn is_empty(&self) -> bool {
        !(present(&self.html) || present(&self.css) || present(&self.javascript) || present(&self.url))
    }

    /// Reject empty requests and unusable URLs
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Validation(
                "At least one of html, css, javascript, or url is required".to_string(),
            ));
        }
        if let Some(url) = self.url.as_ref().filter(|u| !u.is_empty()) {
            let parsed = url::Url::parse(url)
                .map_err(|e| Error::Validation(format!("Invalid url: {}", e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Validation(
                    "Only http and https URLs can be rendered".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Code fields as a preview source
    pub fn source(&self) -> PreviewSource {
        PreviewSource {
            html: self.html.clone().unwrap_or_default(),
            css: self.css.clone().unwrap_or_default(),
            javascript: self.javascript.clone().unwrap_or_default(),
        }
    }
}

/// Web engine result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebExecutionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl WebExecutionResponse {
    fn failure(error: String, started: Instant) -> Self {
        WebExecutionResponse {
            success: false,
            screenshot: None,
            html: None,
            error: Some(error),
            execution_time: started.elapsed().as_millis() as u64,
            url: None,
        }
    }
}

/// Counter snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebEngineStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub supported_technologies: usize,
}

/// Renders pages through a `WebRenderer`
pub struct WebEngine {
    renderer: Arc<dyn WebRenderer>,
    config: BrowserConfig,
    total: AtomicU64,
    failed: AtomicU64,
}

impl WebEngine {
    pub fn new(renderer: Arc<dyn WebRenderer>, config: BrowserConfig) -> Self {
        WebEngine {
            renderer,
            config,
            total: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Engine backed by the configured remote browser
    pub fn from_config(config: &BrowserConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(BrowserlessRenderer::new(config)?),
            config.clone(),
        ))
    }

    pub fn technologies(&self) -> &'static [&'static str] {
        &TECHNOLOGIES
    }

    pub fn stats(&self) -> WebEngineStats {
        WebEngineStats {
            total_requests: self.total.load(Ordering::Relaxed),
            failed_requests: self.failed.load(Ordering::Relaxed),
            supported_technologies: TECHNOLOGIES.len(),
        }
    }

    /// Whether the browser answers within `default_timeout`
    pub async fn health_check(&self) -> bool {
        let check = self.renderer.health_check();
        match tokio::time::timeout(self.config.default_timeout, check).await {
            Ok(Ok(healthy)) => healthy,
            Ok(Err(e)) => {
                warn!(error = %e, "Browser health check failed");
                false
            }
            Err(_) => {
                warn!("Browser health check timed out");
                false
            }
        }
    }

    /// Render a request; failures are reported in the response
    ///
    /// A URL is rendered only when no code fields are present.
    pub async fn execute(&self, request: &WebExecutionRequest) -> WebExecutionResponse {
        let started = Instant::now();
        self.total.fetch_add(1, Ordering::Relaxed);

        let response = match self.build_job(request) {
            Ok(job) => match self.renderer.render(&job).await {
                Ok(page) => WebExecutionResponse {
                    success: true,
                    screenshot: Some(format!(
                        "data:image/png;base64,{}",
                        general_purpose::STANDARD.encode(&page.screenshot_png)
                    )),
                    html: Some(page.html),
                    error: None,
                    execution_time: started.elapsed().as_millis() as u64,
                    url: page.url,
                },
                Err(e) => {
                    let what = match job.target {
                        RenderTarget::Url(_) => "URL",
                        RenderTarget::Html(_) => "HTML",
                    };
                    WebExecutionResponse::failure(format!("{} execution failed: {}", what, e), started)
                }
            },
            Err(e) => WebExecutionResponse::failure(format!("Web execution failed: {}", e), started),
        };

        if !response.success {
            self.failed.fetch_add(1, Ordering::Relaxed);
            warn!(error = ?response.error, "Web execution failed");
        }
        info!(
            success = response.success,
            execution_time = response.execution_time,
            has_screenshot = response.screenshot.is_some(),
            "Web execution completed"
        );

        response
    }

    /// Caller timeout (or the default) clamped to `[1ms, max_timeout]`
    fn bounded_timeout(&self, requested_ms: Option<u64>) -> Duration {
        let max = self.config.max_timeout.max(MIN_TIMEOUT);
        requested_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.default_timeout)
            .clamp(MIN_TIMEOUT, max)
    }

    fn build_job(&self, request: &WebExecutionRequest) -> Result<RenderJob> {
        let viewport = request.viewport.unwrap_or(Viewport {
            width: self.config.viewport_width,
            height: self.config.viewport_height,
        });
        let timeout = self.bounded_timeout(request.timeout);

        let source = request.source();
        let target = match request.url.as_ref().filter(|u| !u.is_empty()) {
            Some(url) if source.is_empty() => RenderTarget::Url(url.clone()),
            _ => {
                let options = ComposeOptions {
                    title: "Code Execution Result".to_string(),
                    console_bridge: false,
                    ..Default::default()
                };
                RenderTarget::Html(compose(&source, &options)?.into_string())
            }
        };

        Ok(RenderJob {
            target,
            viewport,
            timeout,
        })
    }
}
