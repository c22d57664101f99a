use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{Postgres, Transaction};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::memory::StagedWrites;
use crate::database::pipeline::Pipeline;
use crate::filter::{Filter, FilterError, Projection, Sort};

/// A stored document. Identifier lives under `_id`.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Duplicate key in {collection}: {id}")]
    DuplicateKey { collection: String, id: String },

    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),

    #[error("Document is missing a string _id")]
    MissingId,

    #[error("Stored value is not a document: {0}")]
    InvalidDocument(String),

    #[error("Session belongs to a different storage engine")]
    SessionMismatch,

    #[error("Session already committed or aborted")]
    SessionClosed,
}

/// Engine-level read request. Paging is already resolved into skip/limit.
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Sort,
    pub skip: u64,
    pub limit: Option<u64>,
    pub projection: Option<Projection>,
}

impl FindQuery {
    pub fn filter(filter: Filter) -> Self {
        Self { filter, ..Default::default() }
    }
}

/// Partial update: shallow merge of `set`, then removal of `unset` keys.
#[derive(Debug, Clone, Default)]
pub struct Update {
    pub set: Document,
    pub unset: Vec<String>,
}

impl Update {
    pub fn set(set: Document) -> Self {
        Self { set, unset: vec![] }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.set.insert(key.to_string(), value);
        self
    }

    pub fn unset(mut self, key: &str) -> Self {
        self.unset.push(key.to_string());
        self
    }

    pub fn apply(&self, doc: &mut Document) {
        for (key, value) in &self.set {
            doc.insert(key.clone(), value.clone());
        }
        for key in &self.unset {
            doc.remove(key);
        }
    }
}

pub(crate) enum SessionState {
    Postgres(Mutex<Option<Transaction<'static, Postgres>>>),
    Memory(Mutex<Option<StagedWrites>>),
}

/// Transactional context handed out by `DocumentStore::start_session` and
/// threaded through repository options. Clones share the same transaction.
#[derive(Clone)]
pub struct Session {
    id: Uuid,
    pub(crate) state: Arc<SessionState>,
}

impl Session {
    pub(crate) fn new(state: SessionState) -> Self {
        Self { id: Uuid::new_v4(), state: Arc::new(state) }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = match self.state.as_ref() {
            SessionState::Postgres(_) => "postgres",
            SessionState::Memory(_) => "memory",
        };
        f.debug_struct("Session").field("id", &self.id).field("engine", &engine).finish()
    }
}

/// Storage engine contract consumed by `Repository`. Every call accepts an
/// optional session; when present the call runs inside that transaction.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn engine(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn ensure_collection(&self, collection: &str) -> Result<(), StoreError>;

    async fn find(&self, collection: &str, query: &FindQuery, session: Option<&Session>)
        -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: &Filter, session: Option<&Session>) -> Result<u64, StoreError>;

    /// All-or-nothing insert. Fails with `DuplicateKey` on an existing `_id`.
    async fn insert(&self, collection: &str, docs: Vec<Document>, session: Option<&Session>)
        -> Result<(), StoreError>;

    /// Update the first match and return it post-update.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        session: Option<&Session>,
    ) -> Result<Option<Document>, StoreError>;

    /// Update every match, returning how many were modified.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        session: Option<&Session>,
    ) -> Result<u64, StoreError>;

    /// Remove the first match and return it.
    async fn delete_one(&self, collection: &str, filter: &Filter, session: Option<&Session>)
        -> Result<Option<Document>, StoreError>;

    async fn delete_many(&self, collection: &str, filter: &Filter, session: Option<&Session>)
        -> Result<u64, StoreError>;

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline, session: Option<&Session>)
        -> Result<Vec<Document>, StoreError>;

    async fn start_session(&self) -> Result<Session, StoreError>;

    async fn commit(&self, session: Session) -> Result<(), StoreError>;

    async fn abort(&self, session: Session) -> Result<(), StoreError>;
}

/// Collection names are inlined as quoted identifiers, so keep them simple.
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}

pub fn document_id(doc: &Document) -> Result<&str, StoreError> {
    doc.get(ID_FIELD).and_then(Value::as_str).ok_or(StoreError::MissingId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_sets_then_unsets() {
        let mut doc = json!({ "_id": "1", "name": "a", "deletedAt": "x" }).as_object().cloned().unwrap();
        Update::default().with("name", json!("b")).unset("deletedAt").apply(&mut doc);
        assert_eq!(Value::Object(doc), json!({ "_id": "1", "name": "b" }));
    }

    #[test]
    fn collection_names_are_restricted() {
        assert!(validate_collection("api_keys").is_ok());
        assert!(validate_collection("Users").is_err());
        assert!(validate_collection("users; drop").is_err());
        assert!(validate_collection("").is_err());
    }
}
