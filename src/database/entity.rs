use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filter::Projection;

pub const DELETED_AT: &str = "deletedAt";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// A document type stored in its own collection.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;

    /// Populations applied for `JoinOption::Default`.
    fn default_join() -> Vec<Population> {
        Vec::new()
    }
}

/// Fields every stored document carries. Flattened into each entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "deletedAt", default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl EntityMeta {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self { id, created_at: None, updated_at: None, deleted_at: None }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Default for EntityMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the ids held in `field` with the referenced documents.
/// A single id becomes an object (or `null` when dangling); an array of
/// ids becomes an array of the documents that resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    pub field: String,
    pub collection: &'static str,
    pub select: Option<Projection>,
    pub populate: Vec<Population>,
}

impl Population {
    pub fn of<E: Entity>(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            collection: E::COLLECTION,
            select: None,
            populate: Vec::new(),
        }
    }

    pub fn select(mut self, projection: Projection) -> Self {
        self.select = Some(projection);
        self
    }

    pub fn with(mut self, nested: Population) -> Self {
        self.populate.push(nested);
        self
    }
}
