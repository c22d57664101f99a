use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{PasswordHash, UserPayload};
use crate::database::models::{UserDoc, UserEntity};
use crate::database::{
    CreateOptions, DatabaseOptions, DocumentStore, EntityMeta, ExistsOptions, FindAllOptions, FindOneOptions,
    ManyOptions, Repository, RepositoryError, UpdateOptions,
};
use crate::filter::Filter;

/// Profile fields of a new user; the password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_number: Option<String>,
    pub role: Uuid,
}

#[derive(Clone)]
pub struct UserService {
    repository: Repository<UserEntity>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { repository: Repository::new(store) }
    }

    pub async fn find_all(&self, filter: Filter, options: FindAllOptions) -> Result<Vec<UserEntity>, RepositoryError> {
        self.repository.find_all(filter, options).await
    }

    pub async fn find_one_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, RepositoryError> {
        self.repository.find_one_by_id(id, FindOneOptions::default()).await
    }

    /// User with role and permissions expanded.
    pub async fn find_one_by_id_join(&self, id: Uuid) -> Result<Option<UserDoc>, RepositoryError> {
        self.repository.find_one_by_id_as(id, FindOneOptions::join()).await
    }

    pub async fn find_one_by_username(&self, username: &str) -> Result<Option<UserDoc>, RepositoryError> {
        self.repository
            .find_one_as(Filter::eq_ignore_case("username", username), FindOneOptions::join())
            .await
    }

    pub async fn get_total(&self, filter: Filter) -> Result<u64, RepositoryError> {
        self.repository.get_total(filter, DatabaseOptions::default()).await
    }

    pub async fn create(&self, user: NewUser, password: PasswordHash) -> Result<UserEntity, RepositoryError> {
        let entity = UserEntity {
            meta: EntityMeta::new(),
            username: user.username.to_lowercase(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email.to_lowercase(),
            mobile_number: user.mobile_number,
            role: user.role,
            password: password.password_hash,
            password_expired: password.password_expired,
            password_attempt: 0,
            is_active: true,
        };
        self.repository.create(&entity, CreateOptions::default()).await
    }

    pub async fn exist_username(&self, username: &str, exclude: Vec<Uuid>) -> Result<bool, RepositoryError> {
        self.exist_ignore_case("username", username, exclude).await
    }

    pub async fn exist_email(&self, email: &str, exclude: Vec<Uuid>) -> Result<bool, RepositoryError> {
        self.exist_ignore_case("email", email, exclude).await
    }

    pub async fn exist_mobile_number(&self, mobile_number: &str, exclude: Vec<Uuid>) -> Result<bool, RepositoryError> {
        self.exist_ignore_case("mobileNumber", mobile_number, exclude).await
    }

    async fn exist_ignore_case(&self, field: &str, value: &str, exclude: Vec<Uuid>) -> Result<bool, RepositoryError> {
        self.repository
            .exists(Filter::eq_ignore_case(field, value), ExistsOptions::excluding(exclude))
            .await
    }

    pub async fn update_name(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<UserEntity>, RepositoryError> {
        self.set(id, json!({ "firstName": first_name, "lastName": last_name })).await
    }

    pub async fn update_password(&self, id: Uuid, password: &PasswordHash) -> Result<Option<UserEntity>, RepositoryError> {
        self.set(
            id,
            json!({
                "password": password.password_hash,
                "passwordExpired": password.password_expired,
            }),
        )
        .await
    }

    pub async fn update_password_expired(
        &self,
        id: Uuid,
        password_expired: DateTime<Utc>,
    ) -> Result<Option<UserEntity>, RepositoryError> {
        self.set(id, json!({ "passwordExpired": password_expired })).await
    }

    /// Counts from the attempt value the caller read; concurrent failures
    /// for the same user may collapse into one increment.
    pub async fn increase_password_attempt(
        &self,
        id: Uuid,
        current: u32,
    ) -> Result<Option<UserEntity>, RepositoryError> {
        self.set(id, json!({ "passwordAttempt": current + 1 })).await
    }

    pub async fn reset_password_attempt(&self, id: Uuid) -> Result<Option<UserEntity>, RepositoryError> {
        self.set(id, json!({ "passwordAttempt": 0 })).await
    }

    pub async fn active(&self, id: Uuid) -> Result<Option<UserEntity>, RepositoryError> {
        self.set(id, json!({ "isActive": true })).await
    }

    pub async fn inactive(&self, id: Uuid) -> Result<Option<UserEntity>, RepositoryError> {
        self.set(id, json!({ "isActive": false })).await
    }

    async fn set(&self, id: Uuid, set: serde_json::Value) -> Result<Option<UserEntity>, RepositoryError> {
        self.repository.update_one_by_id(id, &set, UpdateOptions::default()).await
    }

    pub async fn delete_one_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, RepositoryError> {
        self.repository.delete_one_by_id(id, UpdateOptions::default()).await
    }

    pub async fn delete_many(&self, filter: Filter) -> Result<bool, RepositoryError> {
        self.repository.delete_many(filter, ManyOptions::default()).await
    }

    pub fn payload_serialization(&self, user: &UserDoc) -> UserPayload {
        UserPayload::from(user)
    }
}
