use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use compass_core::errors::GenerationError;
use compass_engine::EngineError;

/// Wire-level error: a stable machine-readable code plus a human message.
/// No internal error type leaks past this boundary.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub fields: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            fields: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Missing x-user-id header",
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_PARAMS", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: &self.message,
            fields: self.fields.as_ref(),
        };
        (self.status, Json(&body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Immutable => Self::new(
                StatusCode::CONFLICT,
                "WANTS_IMMUTABLE",
                "Completed record cannot be changed",
            ),
            EngineError::NotReady(missing) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                code: "WANTS_NOT_READY",
                message: "Not all exercises are filled in".to_string(),
                fields: Some(serde_json::json!({ "missing": missing })),
            },
            EngineError::AlreadyCompleted => Self::new(
                StatusCode::CONFLICT,
                "RITUALS_ALREADY_COMPLETED",
                "Ritual already completed today",
            ),
            EngineError::NotFound(what) => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", what)
            }
            EngineError::Generation(GenerationError::Timeout(_)) => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                "GENERATION_TIMEOUT",
                "Analysis timed out",
            ),
            EngineError::Generation(other) => Self::new(
                StatusCode::BAD_GATEWAY,
                "GENERATION_FAILED",
                other.to_string(),
            ),
            EngineError::Store(e) => {
                tracing::error!(error = %e, "store error at API boundary");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "Internal error")
            }
        }
    }
}
