//! Server module - HTTP surface of the relay
//!
//! - compiler.rs: `/api/compiler/*` code execution routes
//! - web.rs: `/api/web-engine/*` and `/api/preview/compose`
//! - rate_limit.rs: Fixed-window per-client limits
//! - error.rs: JSON error responses

mod compiler;
mod error;
mod rate_limit;
mod web;

pub use error::ApiError;
pub use rate_limit::{client_key, RateLimiter};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{self, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::{Config, Environment};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::web_engine::WebEngine;

const EXECUTE_LIMIT_MESSAGE: &str = "Too many code execution requests, please try again later.";
const WEB_LIMIT_MESSAGE: &str = "Too many web execution requests, please try again later.";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub web_engine: Arc<WebEngine>,
    pub config: Arc<Config>,
    execute_limiter: RateLimiter,
    web_limiter: RateLimiter,
    started: Instant,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, web_engine: WebEngine, config: Config) -> Self {
        let limits = &config.server.rate_limit;
        let execute_limiter =
            RateLimiter::new(limits.execute_per_minute, limits.window, EXECUTE_LIMIT_MESSAGE);
        let web_limiter = RateLimiter::new(limits.web_per_minute, limits.window, WEB_LIMIT_MESSAGE);

        AppState {
            dispatcher: Arc::new(dispatcher),
            web_engine: Arc::new(web_engine),
            config: Arc::new(config),
            execute_limiter,
            web_limiter,
            started: Instant::now(),
        }
    }

    /// State with every configured back-end
    pub fn from_config(config: Config) -> Result<Self> {
        let dispatcher = Dispatcher::from_config(&config)?;
        let web_engine = WebEngine::from_config(&config.providers.browser)?;
        Ok(Self::new(dispatcher, web_engine, config))
    }

    pub fn environment(&self) -> Environment {
        self.config.server.environment
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    fn error(&self, error: Error) -> ApiError {
        ApiError::new(error, self.environment())
    }

    fn rejection(&self, rejection: JsonRejection) -> ApiError {
        ApiError::from_rejection(rejection, self.environment())
    }
}

/// `{success: true, data}` envelope
fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let compiler = Router::new()
        .route("/execute", post(compiler::execute))
        .route_layer(middleware::from_fn_with_state(
            state.execute_limiter.clone(),
            rate_limit::enforce,
        ))
        .route("/languages", get(compiler::languages))
        .route("/validate", post(compiler::validate))
        .route("/health", get(compiler::health))
        .route("/stats", get(compiler::stats));

    let web_engine = Router::new()
        .route("/execute", post(web::execute))
        .route_layer(middleware::from_fn_with_state(
            state.web_limiter.clone(),
            rate_limit::enforce,
        ))
        .route("/technologies", get(web::technologies))
        .route("/health", get(web::health))
        .route("/stats", get(web::stats));

    let cors = cors_layer(&state.config.server.allowed_origins);
    let environment = state.environment();

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/compiler", compiler)
        .nest("/api/web-engine", web_engine)
        .route("/api/preview/compose", post(web::compose))
        .fallback(not_found)
        .with_state(state);

    with_service_layers(app, cors, environment)
}

/// Panic recovery, tracing, CORS and compression around the routes
fn with_service_layers(app: Router, cors: CorsLayer, environment: Environment) -> Router {
    app.layer(CatchPanicLayer::custom(
        move |panic: Box<dyn Any + Send + 'static>| panic_response(panic, environment),
    ))
    .layer(TraceLayer::new_for_http())
    .layer(cors)
    .layer(CompressionLayer::new())
}

/// A panicking handler becomes the usual 500 body
fn panic_response(panic: Box<dyn Any + Send + 'static>, environment: Environment) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::new(Error::Internal(format!("Handler panicked: {}", detail)), environment)
        .into_response()
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(cors::Any)
}

/// `GET /health`
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.uptime_secs(),
        "version": crate::VERSION,
    }))
}

async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Route not found",
            "path": uri.path(),
            "method": method.as_str(),
        })),
    )
}
