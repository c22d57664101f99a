pub mod api_key;
pub mod auth;
pub mod maintenance;
pub mod response;

pub use api_key::{api_key_middleware, ApiKeyAuth};
pub use auth::{jwt_access_middleware, jwt_refresh_middleware, require_admin, AuthUser, RefreshUser};
pub use maintenance::maintenance_middleware;
pub use response::{ApiResponse, ApiResult};
