use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::entity::{Entity, EntityMeta, Population};
use crate::database::models::permission::PermissionEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessFor {
    SuperAdmin,
    Admin,
    User,
}

impl AccessFor {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessFor::SuperAdmin => "SUPER_ADMIN",
            AccessFor::Admin => "ADMIN",
            AccessFor::User => "USER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "SUPER_ADMIN" => Some(AccessFor::SuperAdmin),
            "ADMIN" => Some(AccessFor::Admin),
            "USER" => Some(AccessFor::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleEntity {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub access_for: AccessFor,
    #[serde(default)]
    pub permissions: Vec<Uuid>,
}

impl RoleEntity {
    pub fn new(name: &str, description: Option<String>, access_for: AccessFor, permissions: Vec<Uuid>) -> Self {
        Self {
            meta: EntityMeta::new(),
            name: name.to_lowercase(),
            description,
            is_active: true,
            access_for,
            permissions,
        }
    }
}

impl Entity for RoleEntity {
    const COLLECTION: &'static str = "roles";

    fn default_join() -> Vec<Population> {
        vec![Population::of::<PermissionEntity>("permissions")]
    }
}

/// Role with its permissions populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDoc {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub access_for: AccessFor,
    #[serde(default)]
    pub permissions: Vec<PermissionEntity>,
}

impl RoleDoc {
    pub fn active_permission_codes(&self) -> Vec<String> {
        self.permissions.iter().filter(|p| p.is_active).map(|p| p.code.clone()).collect()
    }
}
