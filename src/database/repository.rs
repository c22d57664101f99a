use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::database::entity::{Entity, Population, CREATED_AT, DELETED_AT, UPDATED_AT};
use crate::database::options::{
    CreateManyOptions, CreateOptions, DatabaseOptions, ExistsOptions, FindAllOptions, FindOneOptions, JoinOption,
    ManyOptions, UpdateOptions,
};
use crate::database::pipeline::Pipeline;
use crate::database::store::{document_id, Document, DocumentStore, FindQuery, Session, StoreError, Update, ID_FIELD};
use crate::filter::{FieldPath, Filter, FilterError};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Invalid query shape: {0}")]
    InvalidQueryShape(String),

    #[error("Value does not serialize to a document: {0}")]
    NotADocument(String),

    #[error(transparent)]
    InvalidFilter(#[from] FilterError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Soft-delete aware CRUD over one entity collection.
///
/// Reads see live documents unless `with_deleted` is set, in which case
/// they see soft-deleted ones. Hard deletes ignore the marker. Not found is
/// `None`/`false`; engine errors propagate unchanged.
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), _phantom: PhantomData }
    }
}

/// Fixed-width UTC timestamps so string order matches time order.
fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn scoped(filter: Filter, with_deleted: bool) -> Filter {
    filter.and(Filter::exists(DELETED_AT, with_deleted))
}

fn live(filter: Filter) -> Filter {
    scoped(filter, false)
}

fn deleted(filter: Filter) -> Filter {
    scoped(filter, true)
}

fn to_document<S: Serialize + ?Sized>(value: &S) -> Result<Document, RepositoryError> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        other => Err(RepositoryError::NotADocument(other.to_string())),
    }
}

fn decode<Y: DeserializeOwned>(doc: Document) -> Result<Y, RepositoryError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

fn populate<'a>(
    store: &'a dyn DocumentStore,
    docs: &'a mut [Document],
    populations: &'a [Population],
    session: Option<&'a Session>,
) -> BoxFuture<'a, Result<(), RepositoryError>> {
    async move {
        for population in populations {
            let field = population.field.as_str();
            let mut ids: Vec<Value> = Vec::new();
            for doc in docs.iter() {
                let refs: Vec<&str> = match doc.get(field) {
                    Some(Value::String(id)) => vec![id.as_str()],
                    Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
                    _ => continue,
                };
                for id in refs {
                    if !ids.iter().any(|v| v.as_str() == Some(id)) {
                        ids.push(Value::String(id.to_string()));
                    }
                }
            }

            let mut referenced = if ids.is_empty() {
                Vec::new()
            } else {
                let query = FindQuery {
                    filter: Filter::In(FieldPath::from(ID_FIELD), ids),
                    projection: population.select.clone(),
                    ..Default::default()
                };
                store.find(population.collection, &query, session).await?
            };
            populate(store, &mut referenced, &population.populate, session).await?;

            let by_id: HashMap<String, Document> = referenced
                .into_iter()
                .filter_map(|d| Some((document_id(&d).ok()?.to_string(), d)))
                .collect();

            for doc in docs.iter_mut() {
                let resolved = match doc.get(field) {
                    Some(Value::String(id)) => by_id.get(id).cloned().map(Value::Object).unwrap_or(Value::Null),
                    Some(Value::Array(items)) => Value::Array(
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .filter_map(|id| by_id.get(id).cloned().map(Value::Object))
                            .collect(),
                    ),
                    _ => continue,
                };
                doc.insert(field.to_string(), resolved);
            }
        }
        Ok(())
    }
    .boxed()
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store, _phantom: PhantomData }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn collection(&self) -> &'static str {
        T::COLLECTION
    }

    async fn join(
        &self,
        docs: &mut [Document],
        join: Option<&JoinOption>,
        session: Option<&Session>,
    ) -> Result<(), RepositoryError> {
        let populations = JoinOption::resolve::<T>(join);
        if populations.is_empty() || docs.is_empty() {
            return Ok(());
        }
        populate(self.store.as_ref(), docs, &populations, session).await
    }

    fn prepare_insert(&self, mut doc: Document, id: Option<Uuid>) -> Document {
        match id {
            Some(id) => {
                doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            }
            None if !doc.get(ID_FIELD).is_some_and(Value::is_string) => {
                doc.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
            }
            None => {}
        }
        let now = now();
        doc.insert(CREATED_AT.to_string(), now.clone());
        doc.insert(UPDATED_AT.to_string(), now);
        doc
    }

    fn prepare_set<S: Serialize + ?Sized>(set: &S) -> Result<Update, RepositoryError> {
        let mut set = to_document(set)?;
        set.remove(ID_FIELD);
        set.remove(CREATED_AT);
        set.insert(UPDATED_AT.to_string(), now());
        Ok(Update::set(set))
    }

    // ---- reads ----

    pub async fn find_all(&self, filter: Filter, options: FindAllOptions) -> Result<Vec<T>, RepositoryError> {
        self.find_all_as(filter, options).await
    }

    pub async fn find_all_as<Y: DeserializeOwned>(
        &self,
        filter: Filter,
        options: FindAllOptions,
    ) -> Result<Vec<Y>, RepositoryError> {
        let session = options.session.as_ref();
        let query = FindQuery {
            filter: scoped(filter, options.with_deleted),
            sort: options.sort,
            skip: options.paging.map(|p| p.skip).unwrap_or(0),
            limit: options.paging.map(|p| p.limit),
            projection: options.select,
        };
        debug!(collection = T::COLLECTION, with_deleted = options.with_deleted, "find_all");
        let mut docs = self.store.find(T::COLLECTION, &query, session).await?;
        self.join(&mut docs, options.join.as_ref(), session).await?;
        docs.into_iter().map(decode).collect()
    }

    pub async fn find_one(&self, filter: Filter, options: FindOneOptions) -> Result<Option<T>, RepositoryError> {
        self.find_one_as(filter, options).await
    }

    pub async fn find_one_as<Y: DeserializeOwned>(
        &self,
        filter: Filter,
        options: FindOneOptions,
    ) -> Result<Option<Y>, RepositoryError> {
        let session = options.session.as_ref();
        let query = FindQuery {
            filter: scoped(filter, options.with_deleted),
            sort: options.sort,
            limit: Some(1),
            projection: options.select,
            ..Default::default()
        };
        debug!(collection = T::COLLECTION, with_deleted = options.with_deleted, "find_one");
        let mut docs = self.store.find(T::COLLECTION, &query, session).await?;
        docs.truncate(1);
        self.join(&mut docs, options.join.as_ref(), session).await?;
        docs.pop().map(decode).transpose()
    }

    pub async fn find_one_by_id(&self, id: Uuid, options: FindOneOptions) -> Result<Option<T>, RepositoryError> {
        self.find_one_as(Filter::id(id), options).await
    }

    pub async fn find_one_by_id_as<Y: DeserializeOwned>(
        &self,
        id: Uuid,
        options: FindOneOptions,
    ) -> Result<Option<Y>, RepositoryError> {
        self.find_one_as(Filter::id(id), options).await
    }

    pub async fn get_total(&self, filter: Filter, options: DatabaseOptions) -> Result<u64, RepositoryError> {
        let filter = scoped(filter, options.with_deleted);
        Ok(self.store.count(T::COLLECTION, &filter, options.session.as_ref()).await?)
    }

    pub async fn exists(&self, filter: Filter, options: ExistsOptions) -> Result<bool, RepositoryError> {
        let mut filter = scoped(filter, options.with_deleted);
        if !options.exclude_id.is_empty() {
            let excluded = options.exclude_id.iter().map(|id| Value::String(id.to_string())).collect();
            filter = filter.and(Filter::not_in(ID_FIELD, excluded));
        }
        let query = FindQuery { filter, limit: Some(1), ..Default::default() };
        let found = self.store.find(T::COLLECTION, &query, options.session.as_ref()).await?;
        Ok(!found.is_empty())
    }

    // ---- creates ----

    pub async fn create(&self, data: &T, options: CreateOptions) -> Result<T, RepositoryError> {
        let doc = self.prepare_insert(to_document(data)?, options.id);
        debug!(collection = T::COLLECTION, id = ?doc.get(ID_FIELD), "create");
        self.store.insert(T::COLLECTION, vec![doc.clone()], options.session.as_ref()).await?;
        decode(doc)
    }

    pub async fn create_many(&self, data: &[T], options: CreateManyOptions) -> Result<bool, RepositoryError> {
        let docs = data
            .iter()
            .map(|d| Ok(self.prepare_insert(to_document(d)?, None)))
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        debug!(collection = T::COLLECTION, count = docs.len(), "create_many");
        self.store.insert(T::COLLECTION, docs, options.session.as_ref()).await?;
        Ok(true)
    }

    // ---- updates (live only) ----

    async fn mutate_one(
        &self,
        filter: Filter,
        update: Update,
        options: UpdateOptions,
    ) -> Result<Option<T>, RepositoryError> {
        let session = options.session.as_ref();
        let updated = self.store.update_one(T::COLLECTION, &filter, &update, session).await?;
        let mut docs: Vec<Document> = updated.into_iter().collect();
        self.join(&mut docs, options.join.as_ref(), session).await?;
        docs.pop().map(decode).transpose()
    }

    async fn mutate_many(&self, filter: Filter, update: Update, options: ManyOptions) -> Result<bool, RepositoryError> {
        let modified = self
            .store
            .update_many(T::COLLECTION, &filter, &update, options.session.as_ref())
            .await?;
        debug!(collection = T::COLLECTION, modified, "update_many");
        Ok(true)
    }

    pub async fn update_one_by_id<S: Serialize + ?Sized>(
        &self,
        id: Uuid,
        set: &S,
        options: UpdateOptions,
    ) -> Result<Option<T>, RepositoryError> {
        self.update_one(Filter::id(id), set, options).await
    }

    pub async fn update_one<S: Serialize + ?Sized>(
        &self,
        filter: Filter,
        set: &S,
        options: UpdateOptions,
    ) -> Result<Option<T>, RepositoryError> {
        debug!(collection = T::COLLECTION, "update_one");
        self.mutate_one(live(filter), Self::prepare_set(set)?, options).await
    }

    pub async fn update_many<S: Serialize + ?Sized>(
        &self,
        filter: Filter,
        set: &S,
        options: ManyOptions,
    ) -> Result<bool, RepositoryError> {
        self.mutate_many(live(filter), Self::prepare_set(set)?, options).await
    }

    // ---- hard deletes (marker ignored) ----

    pub async fn delete_one_by_id(&self, id: Uuid, options: UpdateOptions) -> Result<Option<T>, RepositoryError> {
        self.delete_one(Filter::id(id), options).await
    }

    pub async fn delete_one(&self, filter: Filter, options: UpdateOptions) -> Result<Option<T>, RepositoryError> {
        let session = options.session.as_ref();
        debug!(collection = T::COLLECTION, "delete_one");
        let removed = self.store.delete_one(T::COLLECTION, &filter, session).await?;
        let mut docs: Vec<Document> = removed.into_iter().collect();
        self.join(&mut docs, options.join.as_ref(), session).await?;
        docs.pop().map(decode).transpose()
    }

    pub async fn delete_many(&self, filter: Filter, options: ManyOptions) -> Result<bool, RepositoryError> {
        let removed = self.store.delete_many(T::COLLECTION, &filter, options.session.as_ref()).await?;
        debug!(collection = T::COLLECTION, removed, "delete_many");
        Ok(true)
    }

    pub async fn delete_many_by_ids(&self, ids: &[Uuid], options: ManyOptions) -> Result<bool, RepositoryError> {
        self.delete_many(Filter::ids(ids), options).await
    }

    // ---- soft deletes (live only) ----

    fn soft_delete_update() -> Update {
        let now = now();
        Update::default().with(DELETED_AT, now.clone()).with(UPDATED_AT, now)
    }

    pub async fn soft_delete_one_by_id(&self, id: Uuid, options: UpdateOptions) -> Result<Option<T>, RepositoryError> {
        self.soft_delete_one(Filter::id(id), options).await
    }

    pub async fn soft_delete_one(&self, filter: Filter, options: UpdateOptions) -> Result<Option<T>, RepositoryError> {
        debug!(collection = T::COLLECTION, "soft_delete_one");
        self.mutate_one(live(filter), Self::soft_delete_update(), options).await
    }

    pub async fn soft_delete_many(&self, filter: Filter, options: ManyOptions) -> Result<bool, RepositoryError> {
        self.mutate_many(live(filter), Self::soft_delete_update(), options).await
    }

    pub async fn soft_delete_many_by_ids(&self, ids: &[Uuid], options: ManyOptions) -> Result<bool, RepositoryError> {
        self.soft_delete_many(Filter::ids(ids), options).await
    }

    // ---- restores (soft-deleted only) ----

    fn restore_update() -> Update {
        Update::default().with(UPDATED_AT, now()).unset(DELETED_AT)
    }

    pub async fn restore_one_by_id(&self, id: Uuid, options: UpdateOptions) -> Result<Option<T>, RepositoryError> {
        self.restore_one(Filter::id(id), options).await
    }

    pub async fn restore_one(&self, filter: Filter, options: UpdateOptions) -> Result<Option<T>, RepositoryError> {
        debug!(collection = T::COLLECTION, "restore_one");
        self.mutate_one(deleted(filter), Self::restore_update(), options).await
    }

    pub async fn restore_many(&self, filter: Filter, options: ManyOptions) -> Result<bool, RepositoryError> {
        self.mutate_many(deleted(filter), Self::restore_update(), options).await
    }

    pub async fn restore_many_by_ids(&self, ids: &[Uuid], options: ManyOptions) -> Result<bool, RepositoryError> {
        self.restore_many(Filter::ids(ids), options).await
    }

    // ---- raw ----

    /// Run an aggregation pipeline. The pipeline is validated before the
    /// engine sees it and is not scoped by the deletion marker.
    pub async fn raw(&self, pipeline: &Value, options: ManyOptions) -> Result<Vec<Document>, RepositoryError> {
        let pipeline = Pipeline::parse(pipeline).map_err(|e| RepositoryError::InvalidQueryShape(e.to_string()))?;
        debug!(collection = T::COLLECTION, stages = pipeline.stages().len(), "raw");
        Ok(self.store.aggregate(T::COLLECTION, &pipeline, options.session.as_ref()).await?)
    }

    pub async fn raw_as<Y: DeserializeOwned>(&self, pipeline: &Value, options: ManyOptions) -> Result<Vec<Y>, RepositoryError> {
        self.raw(pipeline, options).await?.into_iter().map(decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::EntityMeta;
    use crate::database::memory::MemoryStore;
    use crate::filter::{Paging, Sort, SortOrder};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Tag {
        #[serde(flatten)]
        meta: EntityMeta,
        label: String,
    }

    impl Entity for Tag {
        const COLLECTION: &'static str = "tags";
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Widget {
        #[serde(flatten)]
        meta: EntityMeta,
        name: String,
        size: i64,
        #[serde(default)]
        tags: Vec<Uuid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        primary_tag: Option<Uuid>,
    }

    impl Entity for Widget {
        const COLLECTION: &'static str = "widgets";

        fn default_join() -> Vec<Population> {
            vec![Population::of::<Tag>("tags"), Population::of::<Tag>("primaryTag")]
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct WidgetWithTags {
        name: String,
        tags: Vec<Tag>,
        primary_tag: Option<Tag>,
    }

    fn widget(name: &str, size: i64) -> Widget {
        Widget { meta: EntityMeta::new(), name: name.to_string(), size, tags: vec![], primary_tag: None }
    }

    fn repos() -> (Repository<Widget>, Repository<Tag>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        (Repository::new(store.clone()), Repository::new(store))
    }

    fn with_deleted() -> FindOneOptions {
        FindOneOptions { with_deleted: true, ..Default::default() }
    }

    #[tokio::test]
    async fn soft_delete_hides_from_default_reads() {
        let (widgets, _) = repos();
        let w = widgets.create(&widget("a", 1), CreateOptions::default()).await.unwrap();
        let id = w.meta.id;

        assert!(widgets.find_one_by_id(id, FindOneOptions::default()).await.unwrap().is_some());
        assert_eq!(widgets.find_all(Filter::All, FindAllOptions::default()).await.unwrap().len(), 1);

        let removed = widgets.soft_delete_one_by_id(id, UpdateOptions::default()).await.unwrap().unwrap();
        assert!(removed.meta.is_deleted());

        assert!(widgets.find_one_by_id(id, FindOneOptions::default()).await.unwrap().is_none());
        assert!(widgets.find_all(Filter::All, FindAllOptions::default()).await.unwrap().is_empty());
        assert!(widgets.find_one_by_id(id, with_deleted()).await.unwrap().is_some());
        let all_deleted = FindAllOptions { with_deleted: true, ..Default::default() };
        assert_eq!(widgets.find_all(Filter::All, all_deleted).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn restoring_a_live_record_is_a_noop() {
        let (widgets, _) = repos();
        let w = widgets.create(&widget("a", 1), CreateOptions::default()).await.unwrap();
        let before = widgets.find_one_by_id(w.meta.id, FindOneOptions::default()).await.unwrap().unwrap();

        assert!(widgets.restore_one_by_id(w.meta.id, UpdateOptions::default()).await.unwrap().is_none());
        assert!(widgets.restore_one(Filter::eq("name", "a"), UpdateOptions::default()).await.unwrap().is_none());

        let after = widgets.find_one_by_id(w.meta.id, FindOneOptions::default()).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn restore_clears_the_marker() {
        let (widgets, _) = repos();
        let w = widgets.create(&widget("a", 1), CreateOptions::default()).await.unwrap();
        widgets.soft_delete_one_by_id(w.meta.id, UpdateOptions::default()).await.unwrap();

        let restored = widgets
            .restore_one(Filter::eq("name", "a"), UpdateOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert!(!restored.meta.is_deleted());
        assert!(widgets.find_one_by_id(w.meta.id, FindOneOptions::default()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn exists_honours_excluded_ids() {
        let (widgets, _) = repos();
        let w = widgets.create(&widget("a", 1), CreateOptions::default()).await.unwrap();

        assert!(widgets.exists(Filter::eq("name", "a"), ExistsOptions::default()).await.unwrap());
        assert!(!widgets
            .exists(Filter::eq("name", "a"), ExistsOptions::excluding(vec![w.meta.id]))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn hard_delete_removes_regardless_of_marker() {
        let (widgets, _) = repos();
        let a = widgets.create(&widget("a", 1), CreateOptions::default()).await.unwrap();
        let b = widgets.create(&widget("b", 2), CreateOptions::default()).await.unwrap();
        widgets.soft_delete_one_by_id(b.meta.id, UpdateOptions::default()).await.unwrap();

        assert!(widgets.delete_one_by_id(a.meta.id, UpdateOptions::default()).await.unwrap().is_some());
        assert!(widgets.delete_one_by_id(b.meta.id, UpdateOptions::default()).await.unwrap().is_some());

        assert!(widgets.find_one_by_id(a.meta.id, with_deleted()).await.unwrap().is_none());
        assert!(widgets.find_one_by_id(b.meta.id, with_deleted()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_skips_soft_deleted_records() {
        let (widgets, _) = repos();
        let w = widgets.create(&widget("a", 1), CreateOptions::default()).await.unwrap();
        widgets.soft_delete_one_by_id(w.meta.id, UpdateOptions::default()).await.unwrap();

        let updated = widgets
            .update_one_by_id(w.meta.id, &json!({ "name": "b" }), UpdateOptions::default())
            .await
            .unwrap();
        assert!(updated.is_none());

        let still = widgets.find_one_by_id(w.meta.id, with_deleted()).await.unwrap().unwrap();
        assert_eq!(still.name, "a");
        assert!(still.meta.is_deleted());
    }

    #[tokio::test]
    async fn update_returns_post_update_record() {
        let (widgets, _) = repos();
        let w = widgets.create(&widget("a", 1), CreateOptions::default()).await.unwrap();
        let updated = widgets
            .update_one_by_id(w.meta.id, &json!({ "size": 5, "_id": Uuid::new_v4() }), UpdateOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.size, 5);
        assert_eq!(updated.meta.id, w.meta.id);
        assert!(updated.meta.updated_at >= w.meta.updated_at);
    }

    #[tokio::test]
    async fn create_round_trips_and_assigns_ids() {
        let (widgets, _) = repos();
        let input = widget("a", 3);
        let created = widgets.create(&input, CreateOptions::default()).await.unwrap();
        let found = widgets.find_one_by_id(created.meta.id, FindOneOptions::default()).await.unwrap().unwrap();
        assert_eq!(found.name, input.name);
        assert_eq!(found.size, input.size);
        assert_eq!(found.meta.id, input.meta.id);
        assert!(found.meta.created_at.is_some());

        let chosen = Uuid::new_v4();
        let created = widgets
            .create(&widget("b", 1), CreateOptions { id: Some(chosen), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(created.meta.id, chosen);
    }

    #[tokio::test]
    async fn total_matches_unpaged_find() {
        let (widgets, _) = repos();
        let items: Vec<Widget> = (1..=6).map(|n| widget(&format!("w{}", n), n)).collect();
        assert!(widgets.create_many(&items, CreateManyOptions::default()).await.unwrap());
        widgets.soft_delete_one(Filter::eq("name", "w6"), UpdateOptions::default()).await.unwrap();

        let filter = Filter::gt("size", 2);
        let total = widgets.get_total(filter.clone(), DatabaseOptions::default()).await.unwrap();
        let found = widgets.find_all(filter, FindAllOptions::default()).await.unwrap();
        assert_eq!(total, found.len() as u64);
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn find_all_pages_and_sorts() {
        let (widgets, _) = repos();
        let items: Vec<Widget> = (1..=5).map(|n| widget(&format!("w{}", n), n)).collect();
        widgets.create_many(&items, CreateManyOptions::default()).await.unwrap();

        let options = FindAllOptions {
            paging: Some(Paging { limit: 2, skip: 1 }),
            sort: Sort::by("size", SortOrder::Desc),
            ..Default::default()
        };
        let page = widgets.find_all(Filter::All, options).await.unwrap();
        let sizes: Vec<i64> = page.iter().map(|w| w.size).collect();
        assert_eq!(sizes, vec![4, 3]);
    }

    #[tokio::test]
    async fn default_join_populates_references() {
        let (widgets, tags) = repos();
        let red = tags.create(&Tag { meta: EntityMeta::new(), label: "red".into() }, CreateOptions::default()).await.unwrap();
        let blue = tags.create(&Tag { meta: EntityMeta::new(), label: "blue".into() }, CreateOptions::default()).await.unwrap();

        let mut w = widget("a", 1);
        w.tags = vec![red.meta.id, blue.meta.id, Uuid::new_v4()];
        w.primary_tag = Some(Uuid::new_v4());
        let w = widgets.create(&w, CreateOptions::default()).await.unwrap();

        let joined: WidgetWithTags = widgets
            .find_one_by_id_as(w.meta.id, FindOneOptions::join())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(joined.name, "a");
        let labels: Vec<&str> = joined.tags.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["red", "blue"]);
        assert!(joined.primary_tag.is_none());
    }

    #[tokio::test]
    async fn session_commits_and_aborts_atomically() {
        let (widgets, _) = repos();
        let store = widgets.store().clone();

        let session = store.start_session().await.unwrap();
        let opts = CreateOptions { session: Some(session.clone()), ..Default::default() };
        widgets.create(&widget("a", 1), opts.clone()).await.unwrap();
        widgets.create(&widget("b", 2), opts).await.unwrap();
        assert_eq!(widgets.get_total(Filter::All, DatabaseOptions::default()).await.unwrap(), 0);
        store.commit(session).await.unwrap();
        assert_eq!(widgets.get_total(Filter::All, DatabaseOptions::default()).await.unwrap(), 2);

        let session = store.start_session().await.unwrap();
        widgets
            .delete_many(Filter::All, ManyOptions { session: Some(session.clone()) })
            .await
            .unwrap();
        store.abort(session).await.unwrap();
        assert_eq!(widgets.get_total(Filter::All, DatabaseOptions::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn raw_rejects_unsupported_pipelines() {
        let (widgets, _) = repos();
        let err = widgets.raw(&json!({ "name": "a" }), ManyOptions::default()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidQueryShape(_)));
        let err = widgets.raw(&json!([{ "$out": "x" }]), ManyOptions::default()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidQueryShape(_)));
    }

    #[tokio::test]
    async fn raw_runs_aggregations() {
        let (widgets, _) = repos();
        let items: Vec<Widget> = (1..=4).map(|n| widget(&format!("w{}", n), n)).collect();
        widgets.create_many(&items, CreateManyOptions::default()).await.unwrap();

        let out = widgets
            .raw(
                &json!([
                    { "$match": { "size": { "$gte": 2 } } },
                    { "$group": { "_id": null, "total": { "$sum": "$size" }, "n": { "$sum": 1 } } }
                ]),
                ManyOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(Value::Object(out[0].clone()), json!({ "_id": null, "total": 9, "n": 3 }));
    }

    #[tokio::test]
    async fn bulk_soft_delete_and_restore_by_ids() {
        let (widgets, _) = repos();
        let a = widgets.create(&widget("a", 1), CreateOptions::default()).await.unwrap();
        let b = widgets.create(&widget("b", 2), CreateOptions::default()).await.unwrap();
        let ids = [a.meta.id, b.meta.id];

        widgets.soft_delete_many_by_ids(&ids, ManyOptions::default()).await.unwrap();
        assert_eq!(widgets.get_total(Filter::All, DatabaseOptions::default()).await.unwrap(), 0);

        widgets.restore_many_by_ids(&ids[..1], ManyOptions::default()).await.unwrap();
        assert_eq!(widgets.get_total(Filter::All, DatabaseOptions::default()).await.unwrap(), 1);

        widgets.delete_many_by_ids(&ids, ManyOptions::default()).await.unwrap();
        let deleted = DatabaseOptions { with_deleted: true, ..Default::default() };
        assert_eq!(widgets.get_total(Filter::All, deleted).await.unwrap(), 0);
    }
}
