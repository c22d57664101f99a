pub mod api_key_service;
pub mod permission_service;
pub mod role_service;
pub mod seed;
pub mod setting_service;
pub mod user_service;

pub use api_key_service::{ApiKeyCreated, ApiKeyPayload, ApiKeyService};
pub use permission_service::PermissionService;
pub use role_service::RoleService;
pub use setting_service::SettingService;
pub use user_service::{NewUser, UserService};
