use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::auth::AuthService;
use crate::database::models::permission::ALL_PERMISSIONS;
use crate::database::models::setting::MAINTENANCE;
use crate::database::models::{AccessFor, PermissionEntity, SettingType};
use crate::database::{DocumentStore, RepositoryError};
use crate::filter::Filter;
use crate::services::api_key_service::RawApiKey;
use crate::services::{ApiKeyCreated, ApiKeyService, NewUser, PermissionService, RoleService, SettingService, UserService};

pub const DEFAULT_PASSWORD: &str = "aaAA@@123444";

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] crate::auth::AuthError),
}

/// Ids and credentials produced by [`seed`].
#[derive(Debug, Clone)]
pub struct SeedSummary {
    pub super_admin_role: Uuid,
    pub admin_role: Uuid,
    pub user_role: Uuid,
    pub api_key: ApiKeyCreated,
}

/// Default api key credentials. Only meant for local development.
pub fn default_api_key() -> RawApiKey {
    RawApiKey {
        name: "default".to_string(),
        description: Some("Default api key".to_string()),
        key: "v8VB0yY887lMpTA2VJMV".to_string(),
        secret: "zeZbtGTugBTn3Qd5UXtSZBwt7gn3bg".to_string(),
        encryption_key: "opbUwdiS1FBsrDUoPgZdx".to_string(),
        passphrase: "cuwakimacojulawu".to_string(),
    }
}

/// Fills an empty store with permissions, the three base roles, one user
/// per role, the maintenance flag and the default api key.
pub async fn seed(store: Arc<dyn DocumentStore>, auth: &AuthService) -> Result<SeedSummary, SeedError> {
    let permissions = PermissionService::new(store.clone());
    let roles = RoleService::new(store.clone());
    let users = UserService::new(store.clone());
    let settings = SettingService::new(store.clone());
    let api_keys = ApiKeyService::new(store);

    let all: Vec<PermissionEntity> = ALL_PERMISSIONS
        .iter()
        .map(|(group, code, description)| PermissionEntity::new(*group, *code, *description))
        .collect();
    permissions.create_many(&all).await?;
    let permission_ids: Vec<Uuid> = all.iter().map(|p| p.meta.id).collect();
    info!(count = permission_ids.len(), "Seeded permissions");

    let super_admin = roles.create_super_admin().await?;
    let admin = roles
        .create("admin", Some("Administrator".to_string()), AccessFor::Admin, permission_ids)
        .await?;
    let user = roles
        .create("user", Some("Regular user".to_string()), AccessFor::User, Vec::new())
        .await?;
    info!("Seeded roles");

    for (username, role) in [("superadmin", super_admin.meta.id), ("admin", admin.meta.id), ("user", user.meta.id)] {
        let password = auth.create_password(DEFAULT_PASSWORD)?;
        users
            .create(
                NewUser {
                    username: username.to_string(),
                    first_name: username.to_string(),
                    last_name: "test".to_string(),
                    email: format!("{}@mail.com", username),
                    mobile_number: None,
                    role,
                },
                password,
            )
            .await?;
    }
    info!("Seeded users");

    settings
        .create(MAINTENANCE, Some("Maintenance mode".to_string()), SettingType::Boolean, "false")
        .await?;
    info!("Seeded settings");

    let api_key = api_keys.create_raw(default_api_key()).await?;
    info!(key = %api_key.key, "Seeded api key");

    Ok(SeedSummary {
        super_admin_role: super_admin.meta.id,
        admin_role: admin.meta.id,
        user_role: user.meta.id,
        api_key,
    })
}

/// Hard-deletes everything [`seed`] creates.
pub async fn remove(store: Arc<dyn DocumentStore>) -> Result<(), SeedError> {
    ApiKeyService::new(store.clone()).delete_many(Filter::All).await?;
    SettingService::new(store.clone()).delete_many(Filter::All).await?;
    UserService::new(store.clone()).delete_many(Filter::All).await?;
    RoleService::new(store.clone()).delete_many(Filter::All).await?;
    PermissionService::new(store).delete_many(Filter::All).await?;
    info!("Removed seeded data");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::MemoryStore;

    #[tokio::test]
    async fn test_seed_then_remove() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let mut config = AppConfig::development().auth;
        config.bcrypt_cost = 4;
        let auth = AuthService::new(config);

        let summary = seed(store.clone(), &auth).await.unwrap();
        let users = UserService::new(store.clone());
        let admin = users.find_one_by_username("admin").await.unwrap().unwrap();
        assert_eq!(admin.role.meta.id, summary.admin_role);
        assert_eq!(admin.role.active_permission_codes().len(), ALL_PERMISSIONS.len());
        assert!(auth.validate_password(DEFAULT_PASSWORD, &admin.password));

        remove(store.clone()).await.unwrap();
        assert_eq!(users.get_total(Filter::All).await.unwrap(), 0);
        assert_eq!(PermissionService::new(store).get_total(Filter::All).await.unwrap(), 0);
    }
}
