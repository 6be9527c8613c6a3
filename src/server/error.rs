//! API error responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::config::Environment;
use crate::error::Error;

/// Handler error rendered as a JSON body
///
/// Client errors keep their message. Anything else becomes a 500 whose
/// `message` carries the real error only in development.
pub struct ApiError {
    error: Error,
    environment: Environment,
}

impl ApiError {
    pub fn new(error: Error, environment: Environment) -> Self {
        ApiError { error, environment }
    }

    /// Malformed or missing JSON body
    pub fn from_rejection(rejection: JsonRejection, environment: Environment) -> Self {
        ApiError::new(
            Error::Validation(format!("Invalid request body: {}", rejection.body_text())),
            environment,
        )
    }

    pub fn status(&self) -> StatusCode {
        if self.error.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if matches!(self.error, Error::RateLimit(_)) {
            StatusCode::TOO_MANY_REQUESTS
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError::new(error, Environment::Production)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.error, "Request failed");
            let message = match self.environment {
                Environment::Development => self.error.to_string(),
                Environment::Production => "Something went wrong".to_string(),
            };
            json!({
                "success": false,
                "error": "Internal server error",
                "message": message,
            })
        } else {
            json!({ "success": false, "error": self.error.to_string() })
        };
        (status, Json(body)).into_response()
    }
}
