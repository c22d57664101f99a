use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::database::pipeline::{self, Pipeline};
use crate::database::store::{
    document_id, validate_collection, Document, DocumentStore, FindQuery, Session, SessionState, StoreError, Update,
};
use crate::filter::Filter;

/// Collection name to documents, in insertion order.
pub type Collections = HashMap<String, Vec<Document>>;

/// Ids of the documents one operation wrote.
type Touched = HashSet<String>;

/// A session's private view of the store and every document it wrote.
pub(crate) struct StagedWrites {
    view: Collections,
    touched: HashMap<String, Touched>,
}

/// In-process engine used by tests and `DATABASE_ENGINE=memory`.
/// A session works on a private copy of every collection. Commit applies
/// only the documents the session wrote, so concurrent writes survive;
/// a document written on both sides ends up with the session's version.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read<R>(
        &self,
        session: Option<&Session>,
        f: impl FnOnce(&Collections) -> Result<R, StoreError> + Send,
    ) -> Result<R, StoreError> {
        match session {
            None => f(&*self.collections.read().await),
            Some(session) => {
                let staged = memory_state(session)?;
                let guard = staged.lock().await;
                f(&guard.as_ref().ok_or(StoreError::SessionClosed)?.view)
            }
        }
    }

    async fn write<R>(
        &self,
        collection: &str,
        session: Option<&Session>,
        f: impl FnOnce(&mut Collections, &mut Touched) -> Result<R, StoreError> + Send,
    ) -> Result<R, StoreError> {
        let mut touched = Touched::new();
        match session {
            None => f(&mut *self.collections.write().await, &mut touched),
            Some(session) => {
                let staged = memory_state(session)?;
                let mut guard = staged.lock().await;
                let staged = guard.as_mut().ok_or(StoreError::SessionClosed)?;
                let result = f(&mut staged.view, &mut touched)?;
                staged.touched.entry(collection.to_string()).or_default().extend(touched);
                Ok(result)
            }
        }
    }
}

fn memory_state(session: &Session) -> Result<&Mutex<Option<StagedWrites>>, StoreError> {
    match session.state.as_ref() {
        SessionState::Memory(staged) => Ok(staged),
        _ => Err(StoreError::SessionMismatch),
    }
}

fn id_of(doc: &Document) -> Option<String> {
    document_id(doc).ok().map(str::to_string)
}

/// Copies the session's version of each touched document into `live`.
/// Touched ids missing from the view were deleted in the session.
fn apply_staged(live: &mut Collections, staged: StagedWrites) {
    let StagedWrites { mut view, touched } = staged;
    for (collection, ids) in touched {
        let staged_docs = view.remove(&collection).unwrap_or_default();
        let docs = live.entry(collection).or_default();

        let mut kept = Touched::new();
        for doc in staged_docs {
            let Some(id) = id_of(&doc).filter(|id| ids.contains(id)) else {
                continue;
            };
            match docs.iter().position(|d| document_id(d).ok() == Some(id.as_str())) {
                Some(index) => docs[index] = doc,
                None => docs.push(doc),
            }
            kept.insert(id);
        }
        docs.retain(|d| match document_id(d) {
            Ok(id) => !ids.contains(id) || kept.contains(id),
            Err(_) => true,
        });
    }
}

fn select(collections: &Collections, collection: &str, query: &FindQuery) -> Vec<Document> {
    let mut docs: Vec<Document> = collections
        .get(collection)
        .map(|docs| docs.iter().filter(|d| query.filter.matches(d)).cloned().collect())
        .unwrap_or_default();
    pipeline::sort_documents(&mut docs, &query.sort);
    let docs = docs.into_iter().skip(query.skip as usize);
    let docs: Vec<Document> = match query.limit {
        Some(limit) => docs.take(limit as usize).collect(),
        None => docs.collect(),
    };
    match &query.projection {
        Some(projection) => docs.into_iter().map(|d| projection.apply(d)).collect(),
        None => docs,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn engine(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn ensure_collection(&self, collection: &str) -> Result<(), StoreError> {
        validate_collection(collection)?;
        self.collections.write().await.entry(collection.to_string()).or_default();
        Ok(())
    }

    async fn find(&self, collection: &str, query: &FindQuery, session: Option<&Session>)
        -> Result<Vec<Document>, StoreError> {
        validate_collection(collection)?;
        query.filter.validate()?;
        self.read(session, |c| Ok(select(c, collection, query))).await
    }

    async fn count(&self, collection: &str, filter: &Filter, session: Option<&Session>) -> Result<u64, StoreError> {
        validate_collection(collection)?;
        filter.validate()?;
        self.read(session, |c| {
            Ok(c.get(collection)
                .map(|docs| docs.iter().filter(|d| filter.matches(d)).count() as u64)
                .unwrap_or(0))
        })
        .await
    }

    async fn insert(&self, collection: &str, docs: Vec<Document>, session: Option<&Session>)
        -> Result<(), StoreError> {
        validate_collection(collection)?;
        self.write(collection, session, |c, touched| {
            let existing = c.entry(collection.to_string()).or_default();
            let mut seen: Vec<String> = Vec::with_capacity(docs.len());
            for doc in &docs {
                let id = document_id(doc)?;
                let taken = existing.iter().any(|d| document_id(d).ok() == Some(id)) || seen.iter().any(|s| s == id);
                if taken {
                    return Err(StoreError::DuplicateKey { collection: collection.to_string(), id: id.to_string() });
                }
                seen.push(id.to_string());
            }
            existing.extend(docs);
            touched.extend(seen);
            Ok(())
        })
        .await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        session: Option<&Session>,
    ) -> Result<Option<Document>, StoreError> {
        validate_collection(collection)?;
        filter.validate()?;
        self.write(collection, session, |c, touched| {
            let target = c
                .get_mut(collection)
                .and_then(|docs| docs.iter_mut().find(|d| filter.matches(d)));
            Ok(target.map(|doc| {
                update.apply(doc);
                touched.extend(id_of(doc));
                doc.clone()
            }))
        })
        .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        session: Option<&Session>,
    ) -> Result<u64, StoreError> {
        validate_collection(collection)?;
        filter.validate()?;
        self.write(collection, session, |c, touched| {
            let mut modified = 0;
            if let Some(docs) = c.get_mut(collection) {
                for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
                    update.apply(doc);
                    touched.extend(id_of(doc));
                    modified += 1;
                }
            }
            Ok(modified)
        })
        .await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter, session: Option<&Session>)
        -> Result<Option<Document>, StoreError> {
        validate_collection(collection)?;
        filter.validate()?;
        self.write(collection, session, |c, touched| {
            Ok(c.get_mut(collection).and_then(|docs| {
                let index = docs.iter().position(|d| filter.matches(d))?;
                let removed = docs.remove(index);
                touched.extend(id_of(&removed));
                Some(removed)
            }))
        })
        .await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter, session: Option<&Session>)
        -> Result<u64, StoreError> {
        validate_collection(collection)?;
        filter.validate()?;
        self.write(collection, session, |c, touched| {
            Ok(c.get_mut(collection)
                .map(|docs| {
                    let before = docs.len();
                    docs.retain(|d| {
                        let matched = filter.matches(d);
                        if matched {
                            touched.extend(id_of(d));
                        }
                        !matched
                    });
                    (before - docs.len()) as u64
                })
                .unwrap_or(0))
        })
        .await
    }

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline, session: Option<&Session>)
        -> Result<Vec<Document>, StoreError> {
        let (query, rest) = pipeline.pushdown();
        let docs = self.find(collection, &query, session).await?;
        Ok(pipeline::run(rest, docs))
    }

    async fn start_session(&self) -> Result<Session, StoreError> {
        let view = self.collections.read().await.clone();
        let staged = StagedWrites { view, touched: HashMap::new() };
        let session = Session::new(SessionState::Memory(Mutex::new(Some(staged))));
        debug!(session = %session.id(), "memory session started");
        Ok(session)
    }

    async fn commit(&self, session: Session) -> Result<(), StoreError> {
        let staged = memory_state(&session)?.lock().await.take().ok_or(StoreError::SessionClosed)?;
        apply_staged(&mut *self.collections.write().await, staged);
        debug!(session = %session.id(), "memory session committed");
        Ok(())
    }

    async fn abort(&self, session: Session) -> Result<(), StoreError> {
        memory_state(&session)?.lock().await.take().ok_or(StoreError::SessionClosed)?;
        debug!(session = %session.id(), "memory session aborted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Sort, SortOrder};
    use serde_json::{json, Value};

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn rejects_duplicate_ids() {
        let store = MemoryStore::new();
        store.insert("things", vec![doc(json!({ "_id": "a" }))], None).await.unwrap();
        let err = store
            .insert("things", vec![doc(json!({ "_id": "b" })), doc(json!({ "_id": "a" }))], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(store.count("things", &Filter::All, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn finds_sorted_and_paged() {
        let store = MemoryStore::new();
        let docs = (1..=5).map(|n| doc(json!({ "_id": n.to_string(), "n": n }))).collect();
        store.insert("things", docs, None).await.unwrap();

        let query = FindQuery {
            sort: Sort::by("n", SortOrder::Desc),
            skip: 1,
            limit: Some(2),
            ..Default::default()
        };
        let found = store.find("things", &query, None).await.unwrap();
        let ns: Vec<i64> = found.iter().filter_map(|d| d["n"].as_i64()).collect();
        assert_eq!(ns, vec![4, 3]);
    }

    #[tokio::test]
    async fn session_writes_are_invisible_until_commit() {
        let store = MemoryStore::new();
        let session = store.start_session().await.unwrap();
        store.insert("things", vec![doc(json!({ "_id": "a" }))], Some(&session)).await.unwrap();

        assert_eq!(store.count("things", &Filter::All, None).await.unwrap(), 0);
        assert_eq!(store.count("things", &Filter::All, Some(&session)).await.unwrap(), 1);

        store.commit(session.clone()).await.unwrap();
        assert_eq!(store.count("things", &Filter::All, None).await.unwrap(), 1);
        assert!(matches!(
            store.count("things", &Filter::All, Some(&session)).await,
            Err(StoreError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn aborted_session_discards_writes() {
        let store = MemoryStore::new();
        let session = store.start_session().await.unwrap();
        store.insert("things", vec![doc(json!({ "_id": "a" }))], Some(&session)).await.unwrap();
        store.abort(session).await.unwrap();
        assert_eq!(store.count("things", &Filter::All, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn commit_keeps_writes_made_outside_the_session() {
        let store = MemoryStore::new();
        store
            .insert("things", vec![doc(json!({ "_id": "a", "n": 1 })), doc(json!({ "_id": "b", "n": 1 }))], None)
            .await
            .unwrap();

        let session = store.start_session().await.unwrap();
        store.insert("things", vec![doc(json!({ "_id": "outside" }))], None).await.unwrap();
        store.update_one("things", &Filter::eq("_id", "b"), &Update::default().with("n", json!(9)), None).await.unwrap();

        store.insert("things", vec![doc(json!({ "_id": "inside" }))], Some(&session)).await.unwrap();
        store.update_one("things", &Filter::eq("_id", "a"), &Update::default().with("n", json!(2)), Some(&session))
            .await
            .unwrap();
        store.delete_one("things", &Filter::eq("_id", "b"), Some(&session)).await.unwrap();
        store.commit(session).await.unwrap();

        let found = store.find("things", &FindQuery::default(), None).await.unwrap();
        let ids: Vec<&str> = found.iter().filter_map(|d| d["_id"].as_str()).collect();
        assert_eq!(ids, vec!["a", "outside", "inside"]);
        assert_eq!(found[0]["n"], json!(2));
    }
}
