// Response views. Secrets (password hashes, api key hashes, seal material)
// never leave the server through these.
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{
    AccessFor, ApiKeyEntity, PermissionEntity, PermissionGroup, RoleDoc, RoleEntity, SettingEntity, SettingType,
    UserDoc, UserEntity,
};
use crate::database::EntityMeta;
use crate::services::setting_service::get_value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
    pub role: Uuid,
    pub password_expired: DateTime<Utc>,
    pub password_attempt: u32,
    pub is_active: bool,
}

impl From<UserEntity> for UserView {
    fn from(user: UserEntity) -> Self {
        Self {
            meta: user.meta,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            mobile_number: user.mobile_number,
            role: user.role,
            password_expired: user.password_expired,
            password_attempt: user.password_attempt,
            is_active: user.is_active,
        }
    }
}

/// User with the role expanded, for single-record reads.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileView {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
    pub role: RoleProfileView,
    pub password_expired: DateTime<Utc>,
    pub password_attempt: u32,
    pub is_active: bool,
}

impl From<UserDoc> for UserProfileView {
    fn from(user: UserDoc) -> Self {
        Self {
            meta: user.meta,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            mobile_number: user.mobile_number,
            role: user.role.into(),
            password_expired: user.password_expired,
            password_attempt: user.password_attempt,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub access_for: AccessFor,
    pub total_permission: usize,
}

impl From<RoleEntity> for RoleView {
    fn from(role: RoleEntity) -> Self {
        Self {
            meta: role.meta,
            name: role.name,
            description: role.description,
            is_active: role.is_active,
            access_for: role.access_for,
            total_permission: role.permissions.len(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleProfileView {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub access_for: AccessFor,
    pub permissions: Vec<PermissionEntity>,
}

impl From<RoleDoc> for RoleProfileView {
    fn from(role: RoleDoc) -> Self {
        Self {
            meta: role.meta,
            name: role.name,
            description: role.description,
            is_active: role.is_active,
            access_for: role.access_for,
            permissions: role.permissions,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionView {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub group: PermissionGroup,
    pub code: String,
    pub description: String,
    pub is_active: bool,
}

impl From<PermissionEntity> for PermissionView {
    fn from(permission: PermissionEntity) -> Self {
        Self {
            meta: permission.meta,
            group: permission.group,
            code: permission.code,
            description: permission.description,
            is_active: permission.is_active,
        }
    }
}

/// Setting with `value` decoded by its type.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingView {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: SettingType,
    pub value: serde_json::Value,
}

impl From<SettingEntity> for SettingView {
    fn from(setting: SettingEntity) -> Self {
        Self {
            value: get_value(setting.kind, &setting.value),
            meta: setting.meta,
            name: setting.name,
            description: setting.description,
            kind: setting.kind,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyView {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub key: String,
    pub is_active: bool,
}

impl From<ApiKeyEntity> for ApiKeyView {
    fn from(api_key: ApiKeyEntity) -> Self {
        Self {
            meta: api_key.meta,
            name: api_key.name,
            description: api_key.description,
            key: api_key.key,
            is_active: api_key.is_active,
        }
    }
}

/// `{ _id }` acknowledgement for writes.
#[derive(Debug, Serialize)]
pub struct IdView {
    #[serde(rename = "_id")]
    pub id: Uuid,
}

pub fn views<E, V: From<E>>(items: Vec<E>) -> Vec<V> {
    items.into_iter().map(V::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_key_view_hides_secrets() {
        let entity = ApiKeyEntity {
            meta: EntityMeta::new(),
            name: "client".into(),
            description: None,
            key: "key".into(),
            hash: "hash".into(),
            encryption_key: "ek".into(),
            passphrase: "pp".into(),
            is_active: true,
        };
        let value = serde_json::to_value(ApiKeyView::from(entity)).unwrap();
        assert_eq!(value["key"], "key");
        assert!(value.get("hash").is_none());
        assert!(value.get("encryptionKey").is_none());
        assert!(value.get("passphrase").is_none());
        assert!(value.get("_id").is_some());
    }

    #[test]
    fn test_setting_view_decodes_value() {
        let setting = SettingEntity::new("maintenance", None, SettingType::Boolean, "true");
        let value = serde_json::to_value(SettingView::from(setting)).unwrap();
        assert_eq!(value["value"], json!(true));
        assert_eq!(value["type"], "BOOLEAN");
    }
}
