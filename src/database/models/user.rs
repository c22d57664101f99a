use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::entity::{Entity, EntityMeta, Population};
use crate::database::models::permission::PermissionEntity;
use crate::database::models::role::{RoleDoc, RoleEntity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
    pub role: Uuid,
    /// bcrypt hash, salt included.
    pub password: String,
    pub password_expired: DateTime<Utc>,
    #[serde(default)]
    pub password_attempt: u32,
    pub is_active: bool,
}

impl Entity for UserEntity {
    const COLLECTION: &'static str = "users";

    fn default_join() -> Vec<Population> {
        vec![Population::of::<RoleEntity>("role").with(Population::of::<PermissionEntity>("permissions"))]
    }
}

/// User with role and the role's permissions populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
    pub role: RoleDoc,
    pub password: String,
    pub password_expired: DateTime<Utc>,
    #[serde(default)]
    pub password_attempt: u32,
    pub is_active: bool,
}
