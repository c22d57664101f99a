// handlers/mod.rs - Handler tiers
//
// public  - no credentials (/, /health)
// user    - api key, plus a bearer token past login (/api/v1/user/*)
// setting - api key (/api/v1/setting/*)
// admin   - api key + access token + permission codes (/api/v1/admin/*)
pub mod admin;
pub mod public;
pub mod setting;
pub mod user;

use axum::http::StatusCode;

use crate::error::ApiError;

pub(crate) fn not_found(code: &'static str, message: &str) -> ApiError {
    ApiError::coded(StatusCode::NOT_FOUND, code, message)
}

pub(crate) fn bad_request(code: &'static str, message: &str) -> ApiError {
    ApiError::coded(StatusCode::BAD_REQUEST, code, message)
}

pub(crate) fn forbidden(code: &'static str, message: &str) -> ApiError {
    ApiError::coded(StatusCode::FORBIDDEN, code, message)
}

pub(crate) fn conflict(code: &'static str, message: &str) -> ApiError {
    ApiError::coded(StatusCode::CONFLICT, code, message)
}
