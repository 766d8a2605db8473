// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Storage and persistence failures keep their detail server-side: the full
/// message is logged and the caller receives a generic 500 body.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    Validation(String),

    // 401 Unauthorized
    AuthRequired,
    TokenMalformed,
    TokenExpired,
    TokenInvalid,
    InvalidCredentials,

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (uniqueness violations)
    Conflict(String),

    // 500 Internal Server Error
    Storage(String),
    Persistence(String),
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthRequired
            | ApiError::TokenMalformed
            | ApiError::TokenExpired
            | ApiError::TokenInvalid
            | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Storage(_) | ApiError::Persistence(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-safe error message.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(msg) => msg,
            ApiError::AuthRequired => "authentication required",
            ApiError::TokenMalformed => "malformed token",
            ApiError::TokenExpired => "token expired",
            ApiError::TokenInvalid => "invalid token",
            ApiError::InvalidCredentials => "invalid login or password",
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::Storage(_) | ApiError::Persistence(_) | ApiError::Internal(_) => {
                "internal server error"
            }
        }
    }

    /// Stable error code for client handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::AuthRequired => "AUTH_REQUIRED",
            ApiError::TokenMalformed => "TOKEN_MALFORMED",
            ApiError::TokenExpired => "TOKEN_EXPIRED",
            ApiError::TokenInvalid => "TOKEN_INVALID",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Persistence(_) => "PERSISTENCE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code(),
        })
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        ApiError::Storage(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        ApiError::Persistence(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Persistence(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        // Detail for 500-class errors is logged here, never returned.
        match &self {
            ApiError::Storage(detail) => tracing::error!(%detail, "storage error"),
            ApiError::Persistence(detail) => tracing::error!(%detail, "persistence error"),
            ApiError::Internal(detail) => tracing::error!(%detail, "internal error"),
            _ => {}
        }
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            ApiError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::AuthRequired.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::TokenExpired.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::storage("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn expired_and_malformed_are_distinct_conditions() {
        assert_ne!(
            ApiError::TokenExpired.error_code(),
            ApiError::TokenMalformed.error_code()
        );
        assert_eq!(
            ApiError::TokenExpired.status_code(),
            ApiError::TokenMalformed.status_code()
        );
    }

    #[test]
    fn internal_errors_hide_detail() {
        let err = ApiError::persistence("duplicate key value violates unique constraint");
        assert_eq!(err.message(), "internal server error");
        let body = err.to_json();
        assert_eq!(body["success"], false);
        assert!(!body["error"].as_str().unwrap().contains("duplicate"));
    }
}
