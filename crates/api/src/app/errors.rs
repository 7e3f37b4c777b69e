use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use retailpos_auth::AuthzError;
use retailpos_infra::command_dispatcher::DispatchError;
use retailpos_infra::reports::ReportError;

/// Error response: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

pub type ApiResult<T = Response> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "validation_failed", message)
    }

    pub fn invalid_id(what: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(self.status, self.code, self.message)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(msg) => ApiError::validation(msg),
            DispatchError::InvalidId(msg) => ApiError::new(StatusCode::BAD_REQUEST, "invalid_id", msg),
            DispatchError::InvariantViolation(msg) => {
                ApiError::new(StatusCode::CONFLICT, "invariant_violation", msg)
            }
            DispatchError::Concurrency(msg) | DispatchError::Conflict(msg) => ApiError::conflict(msg),
            DispatchError::NotFound => ApiError::new(StatusCode::NOT_FOUND, "not_found", "not found"),
            DispatchError::Unauthorized => ApiError::new(StatusCode::FORBIDDEN, "forbidden", "unauthorized"),
            DispatchError::TenantIsolation(msg) => ApiError::new(StatusCode::FORBIDDEN, "tenant_isolation", msg),
            e @ (DispatchError::Deserialize(_) | DispatchError::Store(_) | DispatchError::Publish(_)) => {
                tracing::warn!(error = %e, "command failed in the store");
                ApiError::internal(e.to_string())
            }
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        let code = match err {
            AuthzError::Suspended => "suspended",
            AuthzError::TenantMismatch | AuthzError::Forbidden(_) => "forbidden",
        };
        ApiError::new(StatusCode::FORBIDDEN, code, err.to_string())
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        ApiError::validation(err.to_string())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": {
                "code": code,
                "message": message.into(),
            }
        })),
    )
        .into_response()
}
