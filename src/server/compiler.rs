//! `/api/compiler` handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{ok, ApiError, AppState};
use crate::core::ExecutionRequest;
use crate::error::Error;

/// Program run by the health route
const HEALTH_PROGRAM: &str = r#"print("Health check passed")"#;
const HEALTH_TIME_LIMIT_MS: u64 = 5000;

/// `POST /api/compiler/execute`
pub async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload.map_err(|e| state.rejection(e))?;
    let request = state.dispatcher.validate(&body).map_err(|e| state.error(e))?;

    let span = info_span!("execute", request_id = %Uuid::new_v4());
    span.in_scope(|| {
        info!(
            language = %request.language,
            source_len = request.source.len(),
            has_stdin = request.has_stdin(),
            "Code execution requested"
        )
    });

    let result = state.dispatcher.dispatch(request).instrument(span).await;
    Ok(ok(result))
}

/// `GET /api/compiler/languages`
pub async fn languages(State(state): State<AppState>) -> Json<Value> {
    let languages: Vec<String> = state.dispatcher.supported_languages().into_iter().collect();
    ok(json!({
        "count": languages.len(),
        "languages": languages,
    }))
}

/// `POST /api/compiler/validate`
pub async fn validate(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload.map_err(|e| state.rejection(e))?;

    let code = required_string(&body, "code", "Code").map_err(|e| state.error(e))?;
    let language = required_string(&body, "language", "Language").map_err(|e| state.error(e))?;

    let report = state.dispatcher.validate_syntax(code, &language.to_lowercase());
    Ok(ok(report))
}

fn required_string<'a>(body: &'a Value, field: &str, label: &str) -> crate::Result<&'a str> {
    match body.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        _ => Err(Error::Validation(format!(
            "{} is required and must be a string",
            label
        ))),
    }
}

/// `GET /api/compiler/health`
///
/// Runs a one-line python program through the dispatcher and reports each
/// provider's own health check.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let started = Instant::now();
    let request =
        ExecutionRequest::new("python", HEALTH_PROGRAM).with_time_limit_ms(HEALTH_TIME_LIMIT_MS);
    let result = state.dispatcher.dispatch(request).await;

    let providers = state.dispatcher.provider_health().await;

    let healthy = result.is_success();
    if !healthy {
        warn!(status = %result.status, error = ?result.error, "Compiler health check failed");
    }

    ok(json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "responseTime": started.elapsed().as_millis() as u64,
        "testExecution": {
            "status": result.status,
            "hasOutput": !result.stdout.is_empty(),
            "executionTime": result.duration_ms,
        },
        "providers": providers,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// `GET /api/compiler/stats`
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    ok(json!({
        "supportedLanguages": state.dispatcher.supported_languages().len(),
        "providers": state.dispatcher.registry().names(),
        "requests": state.dispatcher.stats(),
        "uptime": state.uptime_secs(),
        "version": crate::VERSION,
    }))
}
