// handlers/user/change_password.rs - PATCH /api/v1/user/change-password handler

use axum::{extract::State, Extension};
use serde::Deserialize;
use tracing::info;

use crate::api::request::password_strength;
use crate::api::serialization::IdView;
use crate::api::{FieldErrors, Validate, ValidJson};
use crate::app::AppState;
use crate::error::codes;
use crate::handlers::{bad_request, forbidden, not_found};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("oldPassword", &self.old_password);
        password_strength(errors, "newPassword", &self.new_password);
    }
}

/// PATCH /user/change-password - replace the caller's password
///
/// A wrong old password counts as a failed attempt, same as login.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    ValidJson(body): ValidJson<ChangePasswordRequest>,
) -> ApiResult<IdView> {
    let user = state
        .users
        .find_one_by_id(caller.id)
        .await?
        .ok_or_else(|| not_found(codes::USER_NOT_FOUND, "User not found"))?;

    if user.password_attempt >= state.auth.config().password_max_attempt {
        return Err(forbidden(codes::USER_PASSWORD_ATTEMPT_MAX, "Password attempts exceeded"));
    }

    if !state.auth.validate_password(&body.old_password, &user.password) {
        state.users.increase_password_attempt(user.meta.id, user.password_attempt).await?;
        return Err(bad_request(codes::USER_PASSWORD_NOT_MATCH, "Old password does not match"));
    }

    if body.old_password == body.new_password {
        return Err(bad_request(
            codes::USER_PASSWORD_NEW_MUST_DIFFERENCE,
            "New password must differ from the old one",
        ));
    }

    let password = state.auth.create_password(&body.new_password)?;
    state.users.update_password(user.meta.id, &password).await?;
    state.users.reset_password_attempt(user.meta.id).await?;

    info!(user = %user.username, "Password changed");
    Ok(ApiResponse::success(IdView { id: user.meta.id }))
}
