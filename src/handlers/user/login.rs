// handlers/user/login.rs - POST /api/v1/user/login handler

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{FieldErrors, Validate, ValidJson};
use crate::app::AppState;
use crate::auth::TOKEN_TYPE;
use crate::error::codes;
use crate::handlers::{bad_request, forbidden, not_found};
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

impl Validate for LoginRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("username", &self.username);
        errors.max_length("username", &self.username, 100);
        errors.required("password", &self.password);
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token_type: &'static str,
    pub expires_in: i64,
    pub access_token: String,
    pub refresh_token: String,
    /// Present and true when the caller must change the password.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub password_expired: bool,
}

/// POST /user/login - exchange credentials for an access and refresh token
///
/// Each wrong password counts one attempt; once the attempts reach the
/// configured maximum the account is blocked until an admin resets it.
/// An expired password still logs in, flagged with `passwordExpired`.
pub async fn login(State(state): State<AppState>, ValidJson(body): ValidJson<LoginRequest>) -> ApiResult<TokenResponse> {
    let user = state
        .users
        .find_one_by_username(&body.username)
        .await?
        .ok_or_else(|| not_found(codes::USER_NOT_FOUND, "User not found"))?;

    if user.password_attempt >= state.auth.config().password_max_attempt {
        return Err(forbidden(codes::USER_PASSWORD_ATTEMPT_MAX, "Password attempts exceeded"));
    }

    if !state.auth.validate_password(&body.password, &user.password) {
        state.users.increase_password_attempt(user.meta.id, user.password_attempt).await?;
        return Err(bad_request(codes::USER_PASSWORD_NOT_MATCH, "Password does not match"));
    }

    if !user.is_active {
        return Err(forbidden(codes::USER_INACTIVE, "User is inactive"));
    }
    if !user.role.is_active {
        return Err(forbidden(codes::ROLE_INACTIVE, "Role is inactive"));
    }

    if user.password_attempt > 0 {
        state.users.reset_password_attempt(user.meta.id).await?;
    }

    let payload = state.users.payload_serialization(&user);
    let access_token = state.auth.create_access_token(&payload)?;
    let refresh_token = state
        .auth
        .create_refresh_token(user.meta.id, body.remember_me, Utc::now())?;

    info!(user = %user.username, "User logged in");
    Ok(ApiResponse::success(TokenResponse {
        token_type: TOKEN_TYPE,
        expires_in: state.auth.access_token_expiry_secs(),
        access_token,
        refresh_token,
        password_expired: state.auth.check_password_expired(user.password_expired),
    }))
}
