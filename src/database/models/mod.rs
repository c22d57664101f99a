pub mod api_key;
pub mod permission;
pub mod role;
pub mod setting;
pub mod user;

use crate::database::entity::Entity;

pub use api_key::ApiKeyEntity;
pub use permission::{PermissionEntity, PermissionGroup};
pub use role::{AccessFor, RoleDoc, RoleEntity};
pub use setting::{SettingEntity, SettingType};
pub use user::{UserDoc, UserEntity};

pub const COLLECTIONS: [&str; 5] = [
    PermissionEntity::COLLECTION,
    RoleEntity::COLLECTION,
    UserEntity::COLLECTION,
    SettingEntity::COLLECTION,
    ApiKeyEntity::COLLECTION,
];
