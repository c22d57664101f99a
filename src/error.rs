// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::AuthError;
use crate::database::{DatabaseError, RepositoryError, StoreError};

/// Machine-readable codes for domain failures.
pub mod codes {
    pub const API_KEY_NEEDED: &str = "API_KEY_NEEDED";
    pub const API_KEY_NOT_FOUND: &str = "API_KEY_NOT_FOUND";
    pub const API_KEY_INACTIVE: &str = "API_KEY_INACTIVE";
    pub const API_KEY_ACTIVE: &str = "API_KEY_ACTIVE";
    pub const API_KEY_SCHEMA_INVALID: &str = "API_KEY_SCHEMA_INVALID";
    pub const API_KEY_INVALID: &str = "API_KEY_INVALID";
    pub const API_KEY_TIMESTAMP_INVALID: &str = "API_KEY_TIMESTAMP_INVALID";

    pub const AUTH_JWT_ACCESS_TOKEN_INVALID: &str = "AUTH_JWT_ACCESS_TOKEN_INVALID";
    pub const AUTH_JWT_REFRESH_TOKEN_INVALID: &str = "AUTH_JWT_REFRESH_TOKEN_INVALID";
    pub const AUTH_ACCESS_FOR_INVALID: &str = "AUTH_ACCESS_FOR_INVALID";
    pub const AUTH_PERMISSION_INVALID: &str = "AUTH_PERMISSION_INVALID";

    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    pub const USER_INACTIVE: &str = "USER_INACTIVE";
    pub const USER_ACTIVE: &str = "USER_ACTIVE";
    pub const USER_PASSWORD_NOT_MATCH: &str = "USER_PASSWORD_NOT_MATCH";
    pub const USER_PASSWORD_NEW_MUST_DIFFERENCE: &str = "USER_PASSWORD_NEW_MUST_DIFFERENCE";
    pub const USER_PASSWORD_ATTEMPT_MAX: &str = "USER_PASSWORD_ATTEMPT_MAX";
    pub const USER_PASSWORD_EXPIRED: &str = "USER_PASSWORD_EXPIRED";
    pub const USER_USERNAME_EXIST: &str = "USER_USERNAME_EXIST";
    pub const USER_EMAIL_EXIST: &str = "USER_EMAIL_EXIST";
    pub const USER_MOBILE_NUMBER_EXIST: &str = "USER_MOBILE_NUMBER_EXIST";

    pub const ROLE_NOT_FOUND: &str = "ROLE_NOT_FOUND";
    pub const ROLE_INACTIVE: &str = "ROLE_INACTIVE";
    pub const ROLE_ACTIVE: &str = "ROLE_ACTIVE";
    pub const ROLE_EXIST: &str = "ROLE_EXIST";
    pub const ROLE_USED: &str = "ROLE_USED";

    pub const PERMISSION_NOT_FOUND: &str = "PERMISSION_NOT_FOUND";
    pub const PERMISSION_INACTIVE: &str = "PERMISSION_INACTIVE";
    pub const PERMISSION_ACTIVE: &str = "PERMISSION_ACTIVE";

    pub const SETTING_NOT_FOUND: &str = "SETTING_NOT_FOUND";
    pub const SETTING_VALUE_INVALID: &str = "SETTING_VALUE_INVALID";

    pub const REQUEST_ID_INVALID: &str = "REQUEST_ID_INVALID";
    pub const REQUEST_QUERY_INVALID: &str = "REQUEST_QUERY_INVALID";
    pub const APP_IN_MAINTENANCE: &str = "APP_IN_MAINTENANCE";
}

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 409 Conflict
    Conflict(String),

    // 422 Unprocessable Entity (validation but semantically valid JSON)
    UnprocessableEntity {
        message: String,
        field_errors: HashMap<String, String>,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // Domain failure carrying its own status and code
    Coded {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Conflict(_) => 409,
            ApiError::UnprocessableEntity { .. } => 422,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Coded { status, .. } => status.as_u16(),
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::UnprocessableEntity { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Coded { message, .. } => message,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::UnprocessableEntity { message, field_errors } => {
                json!({
                    "error": true,
                    "message": message,
                    "code": "UNPROCESSABLE_ENTITY",
                    "field_errors": field_errors
                })
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UnprocessableEntity { .. } => "UNPROCESSABLE_ENTITY",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Coded { code, .. } => code,
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn unprocessable_entity(message: impl Into<String>, field_errors: HashMap<String, String>) -> Self {
        ApiError::UnprocessableEntity {
            message: message.into(),
            field_errors,
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    pub fn coded(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Coded {
            status,
            code,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { collection, id } => {
                ApiError::conflict(format!("Duplicate record {} in {}", id, collection))
            }
            StoreError::Filter(e) => ApiError::bad_request(e.to_string()),
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
            other => {
                tracing::error!("Store error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InvalidQueryShape(msg) => ApiError::bad_request(msg),
            RepositoryError::InvalidFilter(e) => ApiError::bad_request(e.to_string()),
            RepositoryError::Store(e) => e.into(),
            other => {
                tracing::error!("Repository error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Store(e) => e.into(),
            other => {
                tracing::error!("Database error: {}", other);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Token(e) => ApiError::unauthorized(format!("Invalid token: {}", e)),
            other => {
                tracing::error!("Auth error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coded_error_body() {
        let err = ApiError::coded(StatusCode::NOT_FOUND, codes::USER_NOT_FOUND, "User not found");
        assert_eq!(err.status_code(), 404);
        assert_eq!(
            err.to_json(),
            json!({"error": true, "message": "User not found", "code": "USER_NOT_FOUND"})
        );
    }

    #[test]
    fn test_duplicate_key_is_conflict() {
        let err: ApiError = RepositoryError::Store(StoreError::DuplicateKey {
            collection: "users".into(),
            id: "x".into(),
        })
        .into();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_unprocessable_lists_fields() {
        let mut fields = HashMap::new();
        fields.insert("username".to_string(), "is required".to_string());
        let body = ApiError::unprocessable_entity("Validation failed", fields).to_json();
        assert_eq!(body["code"], "UNPROCESSABLE_ENTITY");
        assert_eq!(body["field_errors"]["username"], "is required");
    }
}
