//! `/api/web-engine` and `/api/preview` handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::info;

use super::{ok, ApiError, AppState};
use crate::error::Error;
use crate::preview::{compose as compose_document, ComposeOptions, PreviewSource, SandboxPolicy};
use crate::web_engine::WebExecutionRequest;

const HEALTH_HTML: &str = r#"<h1 style="color: blue;">Web Engine Health Check</h1><p>Success!</p>"#;
const HEALTH_CSS: &str = "body { font-family: Arial, sans-serif; margin: 40px; }";
const HEALTH_JS: &str = r#"console.log("Health check executed");"#;
const HEALTH_TIMEOUT_MS: u64 = 10_000;

/// `POST /api/web-engine/execute`
pub async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<WebExecutionRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(|e| state.rejection(e))?;
    request.validate().map_err(|e| state.error(e))?;

    info!(
        html_len = request.html.as_deref().map_or(0, str::len),
        css_len = request.css.as_deref().map_or(0, str::len),
        javascript_len = request.javascript.as_deref().map_or(0, str::len),
        has_url = request.url.is_some(),
        "Web execution requested"
    );

    let response = state.web_engine.execute(&request).await;
    Ok(ok(response))
}

/// `GET /api/web-engine/technologies`
pub async fn technologies(State(state): State<AppState>) -> Json<Value> {
    let technologies = state.web_engine.technologies();
    ok(json!({
        "technologies": technologies,
        "count": technologies.len(),
    }))
}

/// `GET /api/web-engine/health`
///
/// Renders a small page through the configured browser and reports whether
/// the browser answers its own health check.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let started = Instant::now();
    let sample = WebExecutionRequest {
        html: Some(HEALTH_HTML.to_string()),
        css: Some(HEALTH_CSS.to_string()),
        javascript: Some(HEALTH_JS.to_string()),
        timeout: Some(HEALTH_TIMEOUT_MS),
        ..Default::default()
    };
    let result = state.web_engine.execute(&sample).await;
    let browser = state.web_engine.health_check().await;

    ok(json!({
        "status": if result.success { "healthy" } else { "unhealthy" },
        "browser": browser,
        "responseTime": started.elapsed().as_millis() as u64,
        "testExecution": {
            "success": result.success,
            "hasScreenshot": result.screenshot.is_some(),
            "executionTime": result.execution_time,
            "error": result.error,
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// `GET /api/web-engine/stats`
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    ok(json!({
        "engine": state.web_engine.stats(),
        "supportedTechnologies": state.web_engine.technologies().len(),
        "uptime": state.uptime_secs(),
        "version": crate::VERSION,
    }))
}

/// `POST /api/preview/compose`
pub async fn compose(
    State(state): State<AppState>,
    payload: Result<Json<PreviewSource>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(source) = payload.map_err(|e| state.rejection(e))?;
    if source.is_empty() {
        return Err(state.error(Error::Validation(
            "At least one of html, css, or javascript is required".to_string(),
        )));
    }

    let options = ComposeOptions::from_config(&state.config.preview);
    let document = compose_document(&source, &options).map_err(|e| state.error(e))?;
    let iframe = document.to_iframe(&SandboxPolicy::default(), &options.title);

    Ok(ok(json!({
        "document": document,
        "iframe": iframe,
    })))
}
