// handlers/admin/setting.rs - PUT /api/v1/admin/setting/update/:setting handler

use axum::extract::{Path, State};
use serde::Deserialize;
use tracing::info;

use crate::api::serialization::IdView;
use crate::api::{parse_id, FieldErrors, Validate, ValidJson};
use crate::app::AppState;
use crate::database::models::SettingType;
use crate::error::codes;
use crate::handlers::{bad_request, not_found};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::setting_service::check_value;

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    #[serde(rename = "type")]
    pub kind: SettingType,
    pub value: String,
}

impl Validate for UpdateSettingRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("value", &self.value);
    }
}

/// PUT /admin/setting/update/:setting - replace type and value
///
/// The value must parse as the given type, e.g. `"true"` for BOOLEAN.
pub async fn update(
    State(state): State<AppState>,
    Path(setting): Path<String>,
    ValidJson(body): ValidJson<UpdateSettingRequest>,
) -> ApiResult<IdView> {
    let setting = state
        .settings
        .find_one_by_id(parse_id(&setting)?)
        .await?
        .ok_or_else(|| not_found(codes::SETTING_NOT_FOUND, "Setting not found"))?;

    if !check_value(body.kind, &body.value) {
        return Err(bad_request(codes::SETTING_VALUE_INVALID, "Value does not match setting type"));
    }

    state.settings.update_value(setting.meta.id, body.kind, &body.value).await?;
    info!(setting = %setting.name, "Setting updated");
    Ok(ApiResponse::success(IdView { id: setting.meta.id }))
}
