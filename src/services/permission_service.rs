use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::database::models::{PermissionEntity, PermissionGroup};
use crate::database::{
    CreateManyOptions, CreateOptions, DatabaseOptions, DocumentStore, FindAllOptions, FindOneOptions, ManyOptions,
    Repository, RepositoryError, UpdateOptions,
};
use crate::filter::Filter;

#[derive(Clone)]
pub struct PermissionService {
    repository: Repository<PermissionEntity>,
}

impl PermissionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { repository: Repository::new(store) }
    }

    pub async fn find_all(&self, filter: Filter, options: FindAllOptions) -> Result<Vec<PermissionEntity>, RepositoryError> {
        self.repository.find_all(filter, options).await
    }

    pub async fn find_one_by_id(&self, id: Uuid) -> Result<Option<PermissionEntity>, RepositoryError> {
        self.repository.find_one_by_id(id, FindOneOptions::default()).await
    }

    pub async fn find_one_by_code(&self, code: &str) -> Result<Option<PermissionEntity>, RepositoryError> {
        self.repository
            .find_one(Filter::eq("code", code.to_uppercase()), FindOneOptions::default())
            .await
    }

    pub async fn get_total(&self, filter: Filter) -> Result<u64, RepositoryError> {
        self.repository.get_total(filter, DatabaseOptions::default()).await
    }

    pub async fn create(
        &self,
        group: PermissionGroup,
        code: &str,
        description: &str,
    ) -> Result<PermissionEntity, RepositoryError> {
        self.repository
            .create(&PermissionEntity::new(group, code, description), CreateOptions::default())
            .await
    }

    pub async fn create_many(&self, permissions: &[PermissionEntity]) -> Result<bool, RepositoryError> {
        self.repository.create_many(permissions, CreateManyOptions::default()).await
    }

    pub async fn update_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> Result<Option<PermissionEntity>, RepositoryError> {
        self.repository
            .update_one_by_id(id, &json!({ "description": description }), UpdateOptions::default())
            .await
    }

    pub async fn active(&self, id: Uuid) -> Result<Option<PermissionEntity>, RepositoryError> {
        self.set_active(id, true).await
    }

    pub async fn inactive(&self, id: Uuid) -> Result<Option<PermissionEntity>, RepositoryError> {
        self.set_active(id, false).await
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<PermissionEntity>, RepositoryError> {
        self.repository
            .update_one_by_id(id, &json!({ "isActive": is_active }), UpdateOptions::default())
            .await
    }

    pub async fn delete_many(&self, filter: Filter) -> Result<bool, RepositoryError> {
        self.repository.delete_many(filter, ManyOptions::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    #[tokio::test]
    async fn test_code_is_uppercased_and_found() {
        let service = PermissionService::new(Arc::new(MemoryStore::new()));
        let created = service.create(PermissionGroup::User, "user_read", "Read users").await.unwrap();
        assert_eq!(created.code, "USER_READ");

        let found = service.find_one_by_code("user_read").await.unwrap().unwrap();
        assert_eq!(found.meta.id, created.meta.id);
    }

    #[tokio::test]
    async fn test_active_toggle_and_description() {
        let service = PermissionService::new(Arc::new(MemoryStore::new()));
        let created = service.create(PermissionGroup::Role, "ROLE_READ", "Read roles").await.unwrap();

        let inactive = service.inactive(created.meta.id).await.unwrap().unwrap();
        assert!(!inactive.is_active);
        let active = service.active(created.meta.id).await.unwrap().unwrap();
        assert!(active.is_active);

        let updated = service.update_description(created.meta.id, "List roles").await.unwrap().unwrap();
        assert_eq!(updated.description, "List roles");
        assert_eq!(service.get_total(Filter::All).await.unwrap(), 1);
    }
}
