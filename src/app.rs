use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::database::models::permission::*;
use crate::database::DocumentStore;
use crate::handlers::{admin, public, setting, user};
use crate::middleware::{
    api_key_middleware, jwt_access_middleware, jwt_refresh_middleware, maintenance_middleware, require_admin,
};
use crate::services::{ApiKeyService, PermissionService, RoleService, SettingService, UserService};

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub auth: AuthService,
    pub users: UserService,
    pub roles: RoleService,
    pub permissions: PermissionService,
    pub settings: SettingService,
    pub api_keys: ApiKeyService,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            auth: AuthService::new(config.auth.clone()),
            users: UserService::new(store.clone()),
            roles: RoleService::new(store.clone()),
            permissions: PermissionService::new(store.clone()),
            settings: SettingService::new(store.clone()),
            api_keys: ApiKeyService::new(store.clone()),
            config: Arc::new(config),
            store,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(user_routes(&state))
        .merge(setting_routes())
        .nest("/admin", admin_routes(&state))
        // Layers run bottom-up: maintenance first, then the api key.
        .layer(from_fn_with_state(state.clone(), api_key_middleware))
        .layer(from_fn_with_state(state.clone(), maintenance_middleware));

    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .nest("/api/v1", api)
        // Global middleware
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors {
        return CorsLayer::new();
    }
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

fn user_routes(state: &AppState) -> Router<AppState> {
    let refresh = Router::new()
        .route("/user/refresh", post(user::refresh))
        .route_layer(from_fn_with_state(state.clone(), jwt_refresh_middleware));

    let authenticated = Router::new()
        .route("/user/info", get(user::info))
        .route("/user/change-password", patch(user::change_password))
        .route_layer(from_fn_with_state(state.clone(), jwt_access_middleware));

    Router::new()
        .route("/user/login", post(user::login))
        .merge(refresh)
        .merge(authenticated)
}

fn setting_routes() -> Router<AppState> {
    Router::new()
        .route("/setting/list", get(setting::list))
        .route("/setting/get/:setting", get(setting::get))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/user", admin_user_routes())
        .nest("/role", admin_role_routes())
        .nest("/permission", admin_permission_routes())
        .nest("/setting", admin_setting_routes())
        .nest("/api-key", admin_api_key_routes())
        .route_layer(from_fn_with_state(state.clone(), jwt_access_middleware))
}

fn admin_user_routes() -> Router<AppState> {
    use admin::user;

    Router::new()
        .route("/list", get(user::list).route_layer(from_fn(require_admin(&[USER_READ]))))
        .route("/get/:user", get(user::get).route_layer(from_fn(require_admin(&[USER_READ]))))
        .route(
            "/create",
            post(user::create).route_layer(from_fn(require_admin(&[USER_READ, USER_CREATE]))),
        )
        .route(
            "/update/:user",
            put(user::update).route_layer(from_fn(require_admin(&[USER_READ, USER_UPDATE]))),
        )
        .route(
            "/update/:user/inactive",
            patch(user::inactive).route_layer(from_fn(require_admin(&[USER_READ, USER_UPDATE]))),
        )
        .route(
            "/update/:user/active",
            patch(user::active).route_layer(from_fn(require_admin(&[USER_READ, USER_UPDATE]))),
        )
        .route(
            "/delete/:user",
            delete(user::remove).route_layer(from_fn(require_admin(&[USER_READ, USER_DELETE]))),
        )
        .route(
            "/export",
            post(user::export).route_layer(from_fn(require_admin(&[USER_READ, USER_EXPORT]))),
        )
}

fn admin_role_routes() -> Router<AppState> {
    use admin::role;

    Router::new()
        .route("/list", get(role::list).route_layer(from_fn(require_admin(&[ROLE_READ]))))
        .route("/get/:role", get(role::get).route_layer(from_fn(require_admin(&[ROLE_READ]))))
        .route(
            "/create",
            post(role::create).route_layer(from_fn(require_admin(&[ROLE_READ, ROLE_CREATE]))),
        )
        .route(
            "/update/:role",
            put(role::update).route_layer(from_fn(require_admin(&[ROLE_READ, ROLE_UPDATE]))),
        )
        .route(
            "/update/:role/permission",
            put(role::update_permission).route_layer(from_fn(require_admin(&[ROLE_READ, ROLE_UPDATE]))),
        )
        .route(
            "/update/:role/inactive",
            patch(role::inactive).route_layer(from_fn(require_admin(&[ROLE_READ, ROLE_UPDATE]))),
        )
        .route(
            "/update/:role/active",
            patch(role::active).route_layer(from_fn(require_admin(&[ROLE_READ, ROLE_UPDATE]))),
        )
        .route(
            "/delete/:role",
            delete(role::remove).route_layer(from_fn(require_admin(&[ROLE_READ, ROLE_DELETE]))),
        )
}

fn admin_permission_routes() -> Router<AppState> {
    use admin::permission;

    Router::new()
        .route("/list", get(permission::list).route_layer(from_fn(require_admin(&[PERMISSION_READ]))))
        .route(
            "/get/:permission",
            get(permission::get).route_layer(from_fn(require_admin(&[PERMISSION_READ]))),
        )
        .route(
            "/update/:permission",
            put(permission::update).route_layer(from_fn(require_admin(&[PERMISSION_READ, PERMISSION_UPDATE]))),
        )
        .route(
            "/update/:permission/inactive",
            patch(permission::inactive).route_layer(from_fn(require_admin(&[PERMISSION_READ, PERMISSION_UPDATE]))),
        )
        .route(
            "/update/:permission/active",
            patch(permission::active).route_layer(from_fn(require_admin(&[PERMISSION_READ, PERMISSION_UPDATE]))),
        )
}

fn admin_setting_routes() -> Router<AppState> {
    use admin::setting;

    Router::new().route(
        "/update/:setting",
        put(setting::update).route_layer(from_fn(require_admin(&[SETTING_READ, SETTING_UPDATE]))),
    )
}

fn admin_api_key_routes() -> Router<AppState> {
    use admin::api_key;

    Router::new()
        .route("/list", get(api_key::list).route_layer(from_fn(require_admin(&[API_KEY_READ]))))
        .route("/get/:api_key", get(api_key::get).route_layer(from_fn(require_admin(&[API_KEY_READ]))))
        .route(
            "/create",
            post(api_key::create).route_layer(from_fn(require_admin(&[API_KEY_READ, API_KEY_CREATE]))),
        )
        .route(
            "/update/:api_key",
            put(api_key::update).route_layer(from_fn(require_admin(&[API_KEY_READ, API_KEY_UPDATE]))),
        )
        .route(
            "/update/:api_key/reset",
            patch(api_key::reset).route_layer(from_fn(require_admin(&[API_KEY_READ, API_KEY_UPDATE]))),
        )
        .route(
            "/update/:api_key/inactive",
            patch(api_key::inactive).route_layer(from_fn(require_admin(&[API_KEY_READ, API_KEY_UPDATE]))),
        )
        .route(
            "/update/:api_key/active",
            patch(api_key::active).route_layer(from_fn(require_admin(&[API_KEY_READ, API_KEY_UPDATE]))),
        )
        .route(
            "/delete/:api_key",
            delete(api_key::remove).route_layer(from_fn(require_admin(&[API_KEY_READ, API_KEY_DELETE]))),
        )
}
