use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::database::models::{AccessFor, RoleDoc, RoleEntity};
use crate::database::{
    CreateOptions, DatabaseOptions, DocumentStore, ExistsOptions, FindAllOptions, FindOneOptions, ManyOptions,
    Repository, RepositoryError, UpdateOptions,
};
use crate::filter::Filter;

pub const SUPER_ADMIN_ROLE: &str = "superadmin";

#[derive(Clone)]
pub struct RoleService {
    repository: Repository<RoleEntity>,
}

impl RoleService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { repository: Repository::new(store) }
    }

    pub async fn find_all(&self, filter: Filter, options: FindAllOptions) -> Result<Vec<RoleEntity>, RepositoryError> {
        self.repository.find_all(filter, options).await
    }

    pub async fn find_one_by_id(&self, id: Uuid) -> Result<Option<RoleEntity>, RepositoryError> {
        self.repository.find_one_by_id(id, FindOneOptions::default()).await
    }

    /// Role with permissions expanded.
    pub async fn find_one_by_id_join(&self, id: Uuid) -> Result<Option<RoleDoc>, RepositoryError> {
        self.repository.find_one_by_id_as(id, FindOneOptions::join()).await
    }

    pub async fn find_one_by_name(&self, name: &str) -> Result<Option<RoleEntity>, RepositoryError> {
        self.repository
            .find_one(Filter::eq("name", name.to_lowercase()), FindOneOptions::default())
            .await
    }

    pub async fn exists_by_name(&self, name: &str, exclude: Vec<Uuid>) -> Result<bool, RepositoryError> {
        self.repository
            .exists(Filter::eq_ignore_case("name", name), ExistsOptions::excluding(exclude))
            .await
    }

    pub async fn get_total(&self, filter: Filter) -> Result<u64, RepositoryError> {
        self.repository.get_total(filter, DatabaseOptions::default()).await
    }

    pub async fn create(
        &self,
        name: &str,
        description: Option<String>,
        access_for: AccessFor,
        permissions: Vec<Uuid>,
    ) -> Result<RoleEntity, RepositoryError> {
        let role = RoleEntity::new(name, description, access_for, permissions);
        self.repository.create(&role, CreateOptions::default()).await
    }

    /// SUPER_ADMIN passes every permission check, so it carries none.
    pub async fn create_super_admin(&self) -> Result<RoleEntity, RepositoryError> {
        self.create(SUPER_ADMIN_ROLE, None, AccessFor::SuperAdmin, Vec::new()).await
    }

    pub async fn update_name_and_description(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<RoleEntity>, RepositoryError> {
        self.repository
            .update_one_by_id(
                id,
                &json!({ "name": name.to_lowercase(), "description": description }),
                UpdateOptions::default(),
            )
            .await
    }

    pub async fn update_permissions(
        &self,
        id: Uuid,
        access_for: AccessFor,
        permissions: &[Uuid],
    ) -> Result<Option<RoleEntity>, RepositoryError> {
        self.repository
            .update_one_by_id(
                id,
                &json!({ "accessFor": access_for, "permissions": permissions }),
                UpdateOptions::default(),
            )
            .await
    }

    pub async fn active(&self, id: Uuid) -> Result<Option<RoleEntity>, RepositoryError> {
        self.repository
            .update_one_by_id(id, &json!({ "isActive": true }), UpdateOptions::default())
            .await
    }

    pub async fn inactive(&self, id: Uuid) -> Result<Option<RoleEntity>, RepositoryError> {
        self.repository
            .update_one_by_id(id, &json!({ "isActive": false }), UpdateOptions::default())
            .await
    }

    pub async fn delete_one_by_id(&self, id: Uuid) -> Result<Option<RoleEntity>, RepositoryError> {
        self.repository.delete_one_by_id(id, UpdateOptions::default()).await
    }

    pub async fn delete_many(&self, filter: Filter) -> Result<bool, RepositoryError> {
        self.repository.delete_many(filter, ManyOptions::default()).await
    }
}
