// handlers/admin/api_key.rs - /api/v1/admin/api-key/* handlers

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::info;

use crate::api::pagination::boolean_filter;
use crate::api::serialization::{views, ApiKeyView, IdView};
use crate::api::{parse_id, FieldErrors, ListSpec, Pagination, Validate, ValidJson};
use crate::app::AppState;
use crate::database::models::ApiKeyEntity;
use crate::error::{codes, ApiError};
use crate::filter::SortOrder;
use crate::handlers::{bad_request, not_found};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ApiKeyCreated;

const API_KEY_LIST: ListSpec = ListSpec {
    available_search: &["name", "key"],
    available_sort: &["name", "createdAt"],
    default_sort: ("createdAt", SortOrder::Asc),
};

#[derive(Debug, Deserialize)]
pub struct ApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for ApiKeyRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("name", &self.name);
        errors.max_length("name", &self.name, 50);
        if let Some(description) = &self.description {
            errors.max_length("description", description, 280);
        }
    }
}

async fn load(state: &AppState, raw_id: &str) -> Result<ApiKeyEntity, ApiError> {
    state
        .api_keys
        .find_one_by_id(parse_id(raw_id)?)
        .await?
        .ok_or_else(|| not_found(codes::API_KEY_NOT_FOUND, "Api key not found"))
}

/// GET /admin/api-key/list
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<ApiKeyView>> {
    let pagination = Pagination::parse(&params, API_KEY_LIST)?;
    let filter = pagination
        .search
        .clone()
        .and(boolean_filter(&params, "is_active", "isActive")?);

    let total = state.api_keys.get_total(filter.clone()).await?;
    let api_keys = state.api_keys.find_all(filter, pagination.find_options()).await?;
    Ok(ApiResponse::paginated(views(api_keys), pagination.meta(total)))
}

/// GET /admin/api-key/get/:api_key
pub async fn get(State(state): State<AppState>, Path(api_key): Path<String>) -> ApiResult<ApiKeyView> {
    let api_key = load(&state, &api_key).await?;
    Ok(ApiResponse::success(api_key.into()))
}

/// POST /admin/api-key/create - the secret is only ever shown here and on reset
pub async fn create(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<ApiKeyRequest>,
) -> ApiResult<ApiKeyCreated> {
    let created = state.api_keys.create(&body.name, body.description).await?;
    info!(key = %created.key, "Api key created");
    Ok(ApiResponse::created(created))
}

/// PUT /admin/api-key/update/:api_key
pub async fn update(
    State(state): State<AppState>,
    Path(api_key): Path<String>,
    ValidJson(body): ValidJson<ApiKeyRequest>,
) -> ApiResult<IdView> {
    let api_key = load(&state, &api_key).await?;
    state
        .api_keys
        .update_name_and_description(api_key.meta.id, &body.name, body.description.as_deref())
        .await?;
    Ok(ApiResponse::success(IdView { id: api_key.meta.id }))
}

/// PATCH /admin/api-key/update/:api_key/reset - rotate the secret
pub async fn reset(State(state): State<AppState>, Path(api_key): Path<String>) -> ApiResult<ApiKeyCreated> {
    let api_key = load(&state, &api_key).await?;
    let rotated = state
        .api_keys
        .update_hash_by_id(api_key.meta.id)
        .await?
        .ok_or_else(|| not_found(codes::API_KEY_NOT_FOUND, "Api key not found"))?;
    info!(key = %rotated.key, "Api key secret rotated");
    Ok(ApiResponse::success(rotated))
}

/// PATCH /admin/api-key/update/:api_key/inactive
pub async fn inactive(State(state): State<AppState>, Path(api_key): Path<String>) -> ApiResult<IdView> {
    let api_key = load(&state, &api_key).await?;
    if !api_key.is_active {
        return Err(bad_request(codes::API_KEY_INACTIVE, "Api key is already inactive"));
    }
    state.api_keys.inactive(api_key.meta.id).await?;
    Ok(ApiResponse::success(IdView { id: api_key.meta.id }))
}

/// PATCH /admin/api-key/update/:api_key/active
pub async fn active(State(state): State<AppState>, Path(api_key): Path<String>) -> ApiResult<IdView> {
    let api_key = load(&state, &api_key).await?;
    if api_key.is_active {
        return Err(bad_request(codes::API_KEY_ACTIVE, "Api key is already active"));
    }
    state.api_keys.active(api_key.meta.id).await?;
    Ok(ApiResponse::success(IdView { id: api_key.meta.id }))
}

/// DELETE /admin/api-key/delete/:api_key
pub async fn remove(State(state): State<AppState>, Path(api_key): Path<String>) -> ApiResult<IdView> {
    let api_key = load(&state, &api_key).await?;
    state.api_keys.delete_one_by_id(api_key.meta.id).await?;
    info!(key = %api_key.key, "Api key deleted");
    Ok(ApiResponse::success(IdView { id: api_key.meta.id }))
}
