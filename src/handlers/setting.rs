// handlers/setting.rs - GET /api/v1/setting/* handlers (api key only)

use std::collections::HashMap;

use axum::extract::{Path, Query, State};

use crate::api::serialization::{views, SettingView};
use crate::api::{parse_id, ListSpec, Pagination};
use crate::app::AppState;
use crate::error::codes;
use crate::filter::SortOrder;
use crate::handlers::not_found;
use crate::middleware::{ApiResponse, ApiResult};

pub(crate) const SETTING_LIST: ListSpec = ListSpec {
    available_search: &["name"],
    available_sort: &["name", "createdAt"],
    default_sort: ("createdAt", SortOrder::Asc),
};

/// GET /setting/list
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<SettingView>> {
    let pagination = Pagination::parse(&params, SETTING_LIST)?;
    let filter = pagination.search.clone();

    let total = state.settings.get_total(filter.clone()).await?;
    let settings = state.settings.find_all(filter, pagination.find_options()).await?;
    Ok(ApiResponse::paginated(views(settings), pagination.meta(total)))
}

/// GET /setting/get/:setting
pub async fn get(State(state): State<AppState>, Path(setting): Path<String>) -> ApiResult<SettingView> {
    let setting = state
        .settings
        .find_one_by_id(parse_id(&setting)?)
        .await?
        .ok_or_else(|| not_found(codes::SETTING_NOT_FOUND, "Setting not found"))?;
    Ok(ApiResponse::success(setting.into()))
}
