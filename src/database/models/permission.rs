use serde::{Deserialize, Serialize};

use crate::database::entity::{Entity, EntityMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionGroup {
    ApiKey,
    Setting,
    Permission,
    Role,
    User,
}

impl PermissionGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionGroup::ApiKey => "API_KEY",
            PermissionGroup::Setting => "SETTING",
            PermissionGroup::Permission => "PERMISSION",
            PermissionGroup::Role => "ROLE",
            PermissionGroup::User => "USER",
        }
    }
}

pub const API_KEY_READ: &str = "API_KEY_READ";
pub const API_KEY_CREATE: &str = "API_KEY_CREATE";
pub const API_KEY_UPDATE: &str = "API_KEY_UPDATE";
pub const API_KEY_DELETE: &str = "API_KEY_DELETE";
pub const SETTING_READ: &str = "SETTING_READ";
pub const SETTING_UPDATE: &str = "SETTING_UPDATE";
pub const PERMISSION_READ: &str = "PERMISSION_READ";
pub const PERMISSION_UPDATE: &str = "PERMISSION_UPDATE";
pub const ROLE_READ: &str = "ROLE_READ";
pub const ROLE_CREATE: &str = "ROLE_CREATE";
pub const ROLE_UPDATE: &str = "ROLE_UPDATE";
pub const ROLE_DELETE: &str = "ROLE_DELETE";
pub const USER_READ: &str = "USER_READ";
pub const USER_CREATE: &str = "USER_CREATE";
pub const USER_UPDATE: &str = "USER_UPDATE";
pub const USER_DELETE: &str = "USER_DELETE";
pub const USER_EXPORT: &str = "USER_EXPORT";

/// Every permission the seeder creates.
pub const ALL_PERMISSIONS: &[(PermissionGroup, &str, &str)] = &[
    (PermissionGroup::ApiKey, API_KEY_READ, "Read api keys"),
    (PermissionGroup::ApiKey, API_KEY_CREATE, "Create api keys"),
    (PermissionGroup::ApiKey, API_KEY_UPDATE, "Update api keys"),
    (PermissionGroup::ApiKey, API_KEY_DELETE, "Delete api keys"),
    (PermissionGroup::Setting, SETTING_READ, "Read settings"),
    (PermissionGroup::Setting, SETTING_UPDATE, "Update settings"),
    (PermissionGroup::Permission, PERMISSION_READ, "Read permissions"),
    (PermissionGroup::Permission, PERMISSION_UPDATE, "Update permissions"),
    (PermissionGroup::Role, ROLE_READ, "Read roles"),
    (PermissionGroup::Role, ROLE_CREATE, "Create roles"),
    (PermissionGroup::Role, ROLE_UPDATE, "Update roles"),
    (PermissionGroup::Role, ROLE_DELETE, "Delete roles"),
    (PermissionGroup::User, USER_READ, "Read users"),
    (PermissionGroup::User, USER_CREATE, "Create users"),
    (PermissionGroup::User, USER_UPDATE, "Update users"),
    (PermissionGroup::User, USER_DELETE, "Delete users"),
    (PermissionGroup::User, USER_EXPORT, "Export users"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionEntity {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub group: PermissionGroup,
    pub code: String,
    pub description: String,
    pub is_active: bool,
}

impl PermissionEntity {
    pub fn new(group: PermissionGroup, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::new(),
            group,
            code: code.into().to_uppercase(),
            description: description.into(),
            is_active: true,
        }
    }
}

impl Entity for PermissionEntity {
    const COLLECTION: &'static str = "permissions";
}
