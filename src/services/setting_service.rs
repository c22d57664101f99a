use std::sync::Arc;

use serde_json::{json, Number, Value};
use uuid::Uuid;

use crate::database::models::setting::MAINTENANCE;
use crate::database::models::{SettingEntity, SettingType};
use crate::database::{
    CreateOptions, DatabaseOptions, DocumentStore, FindAllOptions, FindOneOptions, ManyOptions, Repository,
    RepositoryError, UpdateOptions,
};
use crate::filter::Filter;

#[derive(Clone)]
pub struct SettingService {
    repository: Repository<SettingEntity>,
}

impl SettingService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { repository: Repository::new(store) }
    }

    pub async fn find_all(&self, filter: Filter, options: FindAllOptions) -> Result<Vec<SettingEntity>, RepositoryError> {
        self.repository.find_all(filter, options).await
    }

    pub async fn find_one_by_id(&self, id: Uuid) -> Result<Option<SettingEntity>, RepositoryError> {
        self.repository.find_one_by_id(id, FindOneOptions::default()).await
    }

    pub async fn find_one_by_name(&self, name: &str) -> Result<Option<SettingEntity>, RepositoryError> {
        self.repository.find_one(Filter::eq("name", name), FindOneOptions::default()).await
    }

    pub async fn get_total(&self, filter: Filter) -> Result<u64, RepositoryError> {
        self.repository.get_total(filter, DatabaseOptions::default()).await
    }

    pub async fn create(
        &self,
        name: &str,
        description: Option<String>,
        kind: SettingType,
        value: &str,
    ) -> Result<SettingEntity, RepositoryError> {
        self.repository
            .create(&SettingEntity::new(name, description, kind, value), CreateOptions::default())
            .await
    }

    pub async fn update_value(
        &self,
        id: Uuid,
        kind: SettingType,
        value: &str,
    ) -> Result<Option<SettingEntity>, RepositoryError> {
        self.repository
            .update_one_by_id(id, &json!({ "type": kind, "value": value }), UpdateOptions::default())
            .await
    }

    pub async fn delete_one(&self, filter: Filter) -> Result<Option<SettingEntity>, RepositoryError> {
        self.repository.delete_one(filter, UpdateOptions::default()).await
    }

    pub async fn delete_many(&self, filter: Filter) -> Result<bool, RepositoryError> {
        self.repository.delete_many(filter, ManyOptions::default()).await
    }

    /// Whether the `maintenance` flag is on. A missing setting means off.
    pub async fn maintenance(&self) -> Result<bool, RepositoryError> {
        let setting = self.find_one_by_name(MAINTENANCE).await?;
        Ok(setting.is_some_and(|s| matches!(get_value(s.kind, &s.value), Value::Bool(true))))
    }
}

/// Decodes a stored setting string by its declared type. Values that do not
/// decode come back as the raw string.
pub fn get_value(kind: SettingType, value: &str) -> Value {
    match kind {
        SettingType::Boolean => match value {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        },
        SettingType::Number => parse_number(value).map(Value::Number).unwrap_or_else(|| Value::String(value.to_string())),
        SettingType::ArrayOfString => Value::Array(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
        SettingType::String => Value::String(value.to_string()),
    }
}

/// Whether `value` is a legal encoding for `kind`.
pub fn check_value(kind: SettingType, value: &str) -> bool {
    match kind {
        SettingType::Boolean => value == "true" || value == "false",
        SettingType::Number => parse_number(value).is_some(),
        SettingType::ArrayOfString | SettingType::String => true,
    }
}

fn parse_number(value: &str) -> Option<Number> {
    let value = value.trim();
    if let Ok(i) = value.parse::<i64>() {
        return Some(Number::from(i));
    }
    value.parse::<f64>().ok().and_then(Number::from_f64)
}
