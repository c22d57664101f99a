// handlers/admin/permission.rs - /api/v1/admin/permission/* handlers
//
// Permissions are seeded, so there is no create or delete here.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::api::pagination::{boolean_filter, enum_filter};
use crate::api::serialization::{views, IdView, PermissionView};
use crate::api::{parse_id, FieldErrors, ListSpec, Pagination, Validate, ValidJson};
use crate::app::AppState;
use crate::database::models::PermissionEntity;
use crate::error::{codes, ApiError};
use crate::filter::SortOrder;
use crate::handlers::{bad_request, not_found};
use crate::middleware::{ApiResponse, ApiResult};

const PERMISSION_LIST: ListSpec = ListSpec {
    available_search: &["code", "description"],
    available_sort: &["code", "group", "createdAt"],
    default_sort: ("group", SortOrder::Asc),
};

const GROUPS: &[&str] = &["API_KEY", "SETTING", "PERMISSION", "ROLE", "USER"];

#[derive(Debug, Deserialize)]
pub struct UpdatePermissionRequest {
    pub description: String,
}

impl Validate for UpdatePermissionRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("description", &self.description);
        errors.max_length("description", &self.description, 280);
    }
}

async fn load(state: &AppState, raw_id: &str) -> Result<PermissionEntity, ApiError> {
    state
        .permissions
        .find_one_by_id(parse_id(raw_id)?)
        .await?
        .ok_or_else(|| not_found(codes::PERMISSION_NOT_FOUND, "Permission not found"))
}

/// GET /admin/permission/list
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<PermissionView>> {
    let pagination = Pagination::parse(&params, PERMISSION_LIST)?;
    let filter = pagination
        .search
        .clone()
        .and(boolean_filter(&params, "is_active", "isActive")?)
        .and(enum_filter(&params, "group", "group", GROUPS)?);

    let total = state.permissions.get_total(filter.clone()).await?;
    let permissions = state.permissions.find_all(filter, pagination.find_options()).await?;
    Ok(ApiResponse::paginated(views(permissions), pagination.meta(total)))
}

/// GET /admin/permission/get/:permission
pub async fn get(State(state): State<AppState>, Path(permission): Path<String>) -> ApiResult<PermissionView> {
    let permission = load(&state, &permission).await?;
    Ok(ApiResponse::success(permission.into()))
}

/// PUT /admin/permission/update/:permission
pub async fn update(
    State(state): State<AppState>,
    Path(permission): Path<String>,
    ValidJson(body): ValidJson<UpdatePermissionRequest>,
) -> ApiResult<IdView> {
    let permission = load(&state, &permission).await?;
    state
        .permissions
        .update_description(permission.meta.id, &body.description)
        .await?;
    Ok(ApiResponse::success(IdView { id: permission.meta.id }))
}

/// PATCH /admin/permission/update/:permission/inactive
pub async fn inactive(State(state): State<AppState>, Path(permission): Path<String>) -> ApiResult<IdView> {
    let permission = load(&state, &permission).await?;
    if !permission.is_active {
        return Err(bad_request(codes::PERMISSION_INACTIVE, "Permission is already inactive"));
    }
    state.permissions.inactive(permission.meta.id).await?;
    Ok(ApiResponse::success(IdView { id: permission.meta.id }))
}

/// PATCH /admin/permission/update/:permission/active
pub async fn active(State(state): State<AppState>, Path(permission): Path<String>) -> ApiResult<IdView> {
    let permission = load(&state, &permission).await?;
    if permission.is_active {
        return Err(bad_request(codes::PERMISSION_ACTIVE, "Permission is already active"));
    }
    state.permissions.active(permission.meta.id).await?;
    Ok(ApiResponse::success(IdView { id: permission.meta.id }))
}
