// handlers/user/info.rs - GET /api/v1/user/info handler

use axum::Extension;

use crate::auth::UserPayload;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /user/info - the payload carried by the caller's access token
pub async fn info(Extension(AuthUser(user)): Extension<AuthUser>) -> ApiResult<UserPayload> {
    Ok(ApiResponse::success(user))
}
