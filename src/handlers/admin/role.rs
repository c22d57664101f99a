// handlers/admin/role.rs - /api/v1/admin/role/* handlers

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::pagination::{boolean_filter, enum_filter};
use crate::api::serialization::{views, IdView, RoleProfileView, RoleView};
use crate::api::{parse_id, FieldErrors, ListSpec, Pagination, Validate, ValidJson};
use crate::app::AppState;
use crate::database::models::{AccessFor, RoleEntity};
use crate::error::{codes, ApiError};
use crate::filter::{Filter, SortOrder};
use crate::handlers::{bad_request, conflict, not_found};
use crate::middleware::{ApiResponse, ApiResult};

const ROLE_LIST: ListSpec = ListSpec {
    available_search: &["name"],
    available_sort: &["name", "createdAt"],
    default_sort: ("createdAt", SortOrder::Asc),
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub access_for: AccessFor,
    #[serde(default)]
    pub permissions: Vec<Uuid>,
}

impl Validate for CreateRoleRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("name", &self.name);
        errors.max_length("name", &self.name, 30);
        if let Some(description) = &self.description {
            errors.max_length("description", description, 500);
        }
        if self.access_for == AccessFor::SuperAdmin {
            errors.add("accessFor", "must be ADMIN or USER");
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for UpdateRoleRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("name", &self.name);
        errors.max_length("name", &self.name, 30);
        if let Some(description) = &self.description {
            errors.max_length("description", description, 500);
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRolePermissionRequest {
    pub access_for: AccessFor,
    #[serde(default)]
    pub permissions: Vec<Uuid>,
}

impl Validate for UpdateRolePermissionRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        if self.access_for == AccessFor::SuperAdmin {
            errors.add("accessFor", "must be ADMIN or USER");
        }
    }
}

async fn load(state: &AppState, raw_id: &str) -> Result<RoleEntity, ApiError> {
    state
        .roles
        .find_one_by_id(parse_id(raw_id)?)
        .await?
        .ok_or_else(|| not_found(codes::ROLE_NOT_FOUND, "Role not found"))
}

/// Every id must name a live permission.
async fn check_permissions(state: &AppState, permissions: &[Uuid]) -> Result<(), ApiError> {
    if permissions.is_empty() {
        return Ok(());
    }
    let mut unique = permissions.to_vec();
    unique.sort();
    unique.dedup();
    let found = state.permissions.get_total(Filter::ids(&unique)).await?;
    if found as usize != unique.len() {
        return Err(not_found(codes::PERMISSION_NOT_FOUND, "Permission not found"));
    }
    Ok(())
}

/// GET /admin/role/list
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<RoleView>> {
    let pagination = Pagination::parse(&params, ROLE_LIST)?;
    let filter = pagination
        .search
        .clone()
        .and(boolean_filter(&params, "is_active", "isActive")?)
        .and(enum_filter(&params, "access_for", "accessFor", &["SUPER_ADMIN", "ADMIN", "USER"])?);

    let total = state.roles.get_total(filter.clone()).await?;
    let roles = state.roles.find_all(filter, pagination.find_options()).await?;
    Ok(ApiResponse::paginated(views(roles), pagination.meta(total)))
}

/// GET /admin/role/get/:role - role with its permissions expanded
pub async fn get(State(state): State<AppState>, Path(role): Path<String>) -> ApiResult<RoleProfileView> {
    let role = state
        .roles
        .find_one_by_id_join(parse_id(&role)?)
        .await?
        .ok_or_else(|| not_found(codes::ROLE_NOT_FOUND, "Role not found"))?;
    Ok(ApiResponse::success(role.into()))
}

/// POST /admin/role/create
pub async fn create(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<CreateRoleRequest>,
) -> ApiResult<IdView> {
    if state.roles.exists_by_name(&body.name, Vec::new()).await? {
        return Err(conflict(codes::ROLE_EXIST, "Role already exists"));
    }
    check_permissions(&state, &body.permissions).await?;

    let role = state
        .roles
        .create(&body.name, body.description, body.access_for, body.permissions)
        .await?;

    info!(role = %role.name, "Role created");
    Ok(ApiResponse::created(IdView { id: role.meta.id }))
}

/// PUT /admin/role/update/:role
pub async fn update(
    State(state): State<AppState>,
    Path(role): Path<String>,
    ValidJson(body): ValidJson<UpdateRoleRequest>,
) -> ApiResult<IdView> {
    let role = load(&state, &role).await?;
    if state.roles.exists_by_name(&body.name, vec![role.meta.id]).await? {
        return Err(conflict(codes::ROLE_EXIST, "Role already exists"));
    }
    state
        .roles
        .update_name_and_description(role.meta.id, &body.name, body.description.as_deref())
        .await?;
    Ok(ApiResponse::success(IdView { id: role.meta.id }))
}

/// PUT /admin/role/update/:role/permission
pub async fn update_permission(
    State(state): State<AppState>,
    Path(role): Path<String>,
    ValidJson(body): ValidJson<UpdateRolePermissionRequest>,
) -> ApiResult<IdView> {
    let role = load(&state, &role).await?;
    check_permissions(&state, &body.permissions).await?;
    state
        .roles
        .update_permissions(role.meta.id, body.access_for, &body.permissions)
        .await?;
    Ok(ApiResponse::success(IdView { id: role.meta.id }))
}

/// PATCH /admin/role/update/:role/inactive
pub async fn inactive(State(state): State<AppState>, Path(role): Path<String>) -> ApiResult<IdView> {
    let role = load(&state, &role).await?;
    if !role.is_active {
        return Err(bad_request(codes::ROLE_INACTIVE, "Role is already inactive"));
    }
    state.roles.inactive(role.meta.id).await?;
    Ok(ApiResponse::success(IdView { id: role.meta.id }))
}

/// PATCH /admin/role/update/:role/active
pub async fn active(State(state): State<AppState>, Path(role): Path<String>) -> ApiResult<IdView> {
    let role = load(&state, &role).await?;
    if role.is_active {
        return Err(bad_request(codes::ROLE_ACTIVE, "Role is already active"));
    }
    state.roles.active(role.meta.id).await?;
    Ok(ApiResponse::success(IdView { id: role.meta.id }))
}

/// DELETE /admin/role/delete/:role - refused while any live user holds it
pub async fn remove(State(state): State<AppState>, Path(role): Path<String>) -> ApiResult<IdView> {
    let role = load(&state, &role).await?;
    let holders = state
        .users
        .get_total(Filter::eq("role", role.meta.id.to_string()))
        .await?;
    if holders > 0 {
        return Err(conflict(codes::ROLE_USED, "Role is assigned to users"));
    }
    state.roles.delete_one_by_id(role.meta.id).await?;
    info!(role = %role.name, "Role deleted");
    Ok(ApiResponse::success(IdView { id: role.meta.id }))
}
