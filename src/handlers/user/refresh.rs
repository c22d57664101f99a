// handlers/user/refresh.rs - POST /api/v1/user/refresh handler

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Extension,
};

use crate::app::AppState;
use crate::auth::TOKEN_TYPE;
use crate::error::codes;
use crate::handlers::user::TokenResponse;
use crate::handlers::{forbidden, not_found};
use crate::middleware::{ApiResponse, ApiResult, RefreshUser};

/// POST /user/refresh - new access token for a valid refresh token
///
/// The user is re-read so deactivation and password expiry take effect
/// without waiting for the refresh token to lapse.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(RefreshUser(claims)): Extension<RefreshUser>,
    headers: HeaderMap,
) -> ApiResult<TokenResponse> {
    let user = state
        .users
        .find_one_by_id_join(claims.id)
        .await?
        .ok_or_else(|| not_found(codes::USER_NOT_FOUND, "User not found"))?;

    if !user.is_active {
        return Err(forbidden(codes::USER_INACTIVE, "User is inactive"));
    }
    if !user.role.is_active {
        return Err(forbidden(codes::ROLE_INACTIVE, "Role is inactive"));
    }
    if state.auth.check_password_expired(user.password_expired) {
        return Err(forbidden(codes::USER_PASSWORD_EXPIRED, "Password expired"));
    }

    let payload = state.users.payload_serialization(&user);
    let access_token = state.auth.create_access_token(&payload)?;

    // The middleware already validated this header.
    let refresh_token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .unwrap_or_default();

    Ok(ApiResponse::success(TokenResponse {
        token_type: TOKEN_TYPE,
        expires_in: state.auth.access_token_expiry_secs(),
        access_token,
        refresh_token,
        password_expired: false,
    }))
}
