// handlers/admin/user.rs - /api/v1/admin/user/* handlers

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::pagination::boolean_filter;
use crate::api::request::password_strength;
use crate::api::serialization::{views, IdView, UserProfileView, UserView};
use crate::api::{parse_id, FieldErrors, ListSpec, Pagination, Validate, ValidJson};
use crate::app::AppState;
use crate::database::models::UserEntity;
use crate::database::FindAllOptions;
use crate::error::{codes, ApiError};
use crate::filter::{Filter, Sort, SortOrder};
use crate::handlers::{bad_request, conflict, not_found};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::NewUser;

const USER_LIST: ListSpec = ListSpec {
    available_search: &["username", "firstName", "lastName", "email", "mobileNumber"],
    available_sort: &["username", "firstName", "lastName", "email", "createdAt"],
    default_sort: ("createdAt", SortOrder::Asc),
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub mobile_number: Option<String>,
    pub role: Uuid,
    pub password: String,
}

impl Validate for CreateUserRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("username", &self.username);
        errors.max_length("username", &self.username, 100);
        if !self.username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            errors.add("username", "may only contain letters, digits, '_' and '.'");
        }
        errors.required("firstName", &self.first_name);
        errors.max_length("firstName", &self.first_name, 30);
        errors.required("lastName", &self.last_name);
        errors.max_length("lastName", &self.last_name, 30);
        errors.required("email", &self.email);
        if !self.email.contains('@') {
            errors.add("email", "must be an email address");
        }
        if let Some(mobile) = &self.mobile_number {
            if mobile.len() < 10 || mobile.len() > 14 || !mobile.chars().all(|c| c.is_ascii_digit()) {
                errors.add("mobileNumber", "must be 10 to 14 digits");
            }
        }
        password_strength(errors, "password", &self.password);
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: String,
    pub last_name: String,
}

impl Validate for UpdateUserRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("firstName", &self.first_name);
        errors.max_length("firstName", &self.first_name, 30);
        errors.required("lastName", &self.last_name);
        errors.max_length("lastName", &self.last_name, 30);
    }
}

async fn load(state: &AppState, raw_id: &str) -> Result<UserEntity, ApiError> {
    state
        .users
        .find_one_by_id(parse_id(raw_id)?)
        .await?
        .ok_or_else(|| not_found(codes::USER_NOT_FOUND, "User not found"))
}

/// GET /admin/user/list
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<UserView>> {
    let pagination = Pagination::parse(&params, USER_LIST)?;
    let filter = pagination
        .search
        .clone()
        .and(boolean_filter(&params, "is_active", "isActive")?);

    let total = state.users.get_total(filter.clone()).await?;
    let users = state.users.find_all(filter, pagination.find_options()).await?;
    Ok(ApiResponse::paginated(views(users), pagination.meta(total)))
}

/// GET /admin/user/get/:user
pub async fn get(State(state): State<AppState>, Path(user): Path<String>) -> ApiResult<UserProfileView> {
    let user = state
        .users
        .find_one_by_id_join(parse_id(&user)?)
        .await?
        .ok_or_else(|| not_found(codes::USER_NOT_FOUND, "User not found"))?;
    Ok(ApiResponse::success(user.into()))
}

/// POST /admin/user/create
pub async fn create(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<CreateUserRequest>,
) -> ApiResult<IdView> {
    if state.roles.find_one_by_id(body.role).await?.is_none() {
        return Err(not_found(codes::ROLE_NOT_FOUND, "Role not found"));
    }
    if state.users.exist_username(&body.username, Vec::new()).await? {
        return Err(conflict(codes::USER_USERNAME_EXIST, "Username already used"));
    }
    if state.users.exist_email(&body.email, Vec::new()).await? {
        return Err(conflict(codes::USER_EMAIL_EXIST, "Email already used"));
    }
    if let Some(mobile) = &body.mobile_number {
        if state.users.exist_mobile_number(mobile, Vec::new()).await? {
            return Err(conflict(codes::USER_MOBILE_NUMBER_EXIST, "Mobile number already used"));
        }
    }

    let password = state.auth.create_password(&body.password)?;
    let user = state
        .users
        .create(
            NewUser {
                username: body.username,
                first_name: body.first_name,
                last_name: body.last_name,
                email: body.email,
                mobile_number: body.mobile_number,
                role: body.role,
            },
            password,
        )
        .await?;

    info!(user = %user.username, "User created");
    Ok(ApiResponse::created(IdView { id: user.meta.id }))
}

/// PUT /admin/user/update/:user
pub async fn update(
    State(state): State<AppState>,
    Path(user): Path<String>,
    ValidJson(body): ValidJson<UpdateUserRequest>,
) -> ApiResult<IdView> {
    let user = load(&state, &user).await?;
    state
        .users
        .update_name(user.meta.id, &body.first_name, &body.last_name)
        .await?;
    Ok(ApiResponse::success(IdView { id: user.meta.id }))
}

/// PATCH /admin/user/update/:user/inactive
pub async fn inactive(State(state): State<AppState>, Path(user): Path<String>) -> ApiResult<IdView> {
    let user = load(&state, &user).await?;
    if !user.is_active {
        return Err(bad_request(codes::USER_INACTIVE, "User is already inactive"));
    }
    state.users.inactive(user.meta.id).await?;
    Ok(ApiResponse::success(IdView { id: user.meta.id }))
}

/// PATCH /admin/user/update/:user/active
pub async fn active(State(state): State<AppState>, Path(user): Path<String>) -> ApiResult<IdView> {
    let user = load(&state, &user).await?;
    if user.is_active {
        return Err(bad_request(codes::USER_ACTIVE, "User is already active"));
    }
    state.users.active(user.meta.id).await?;
    Ok(ApiResponse::success(IdView { id: user.meta.id }))
}

/// DELETE /admin/user/delete/:user
pub async fn remove(State(state): State<AppState>, Path(user): Path<String>) -> ApiResult<IdView> {
    let user = load(&state, &user).await?;
    state.users.delete_one_by_id(user.meta.id).await?;
    info!(user = %user.username, "User deleted");
    Ok(ApiResponse::success(IdView { id: user.meta.id }))
}

/// POST /admin/user/export - every live user, unpaginated
pub async fn export(State(state): State<AppState>) -> ApiResult<Vec<UserView>> {
    let users = state
        .users
        .find_all(
            Filter::All,
            FindAllOptions {
                sort: Sort::by("createdAt", SortOrder::Asc),
                ..Default::default()
            },
        )
        .await?;
    Ok(ApiResponse::success(views(users)))
}
