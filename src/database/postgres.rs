use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::database::pipeline::{self, Pipeline};
use crate::database::query_builder::{bind_params, QueryBuilder};
use crate::database::store::{Document, DocumentStore, FindQuery, Session, SessionState, StoreError, Update};
use crate::filter::types::SqlResult;
use crate::filter::Filter;

/// Postgres engine: one JSONB document table per collection.
pub struct PgStore {
    pool: PgPool,
}

type PgSession = Mutex<Option<Transaction<'static, Postgres>>>;

fn pg_state(session: &Session) -> Result<&PgSession, StoreError> {
    match session.state.as_ref() {
        SessionState::Postgres(tx) => Ok(tx),
        _ => Err(StoreError::SessionMismatch),
    }
}

fn row_document(row: &PgRow) -> Result<Document, StoreError> {
    match row.try_get::<Value, _>("doc")? {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::InvalidDocument(other.to_string())),
    }
}

fn map_insert_error(collection: &str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => StoreError::DuplicateKey {
            collection: collection.to_string(),
            id: db.message().to_string(),
        },
        _ => {
            error!("Insert into {} failed: {}", collection, err);
            StoreError::Sqlx(err)
        }
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_all(&self, sql: &SqlResult, session: Option<&Session>) -> Result<Vec<PgRow>, StoreError> {
        debug!(query = %sql.query, params = sql.params.len(), "pg fetch_all");
        let rows = match session {
            None => bind_params(sql).fetch_all(&self.pool).await?,
            Some(session) => {
                let mut guard = pg_state(session)?.lock().await;
                let tx = guard.as_mut().ok_or(StoreError::SessionClosed)?;
                bind_params(sql).fetch_all(&mut **tx).await?
            }
        };
        Ok(rows)
    }

    async fn fetch_optional(&self, sql: &SqlResult, session: Option<&Session>) -> Result<Option<PgRow>, StoreError> {
        debug!(query = %sql.query, params = sql.params.len(), "pg fetch_optional");
        let row = match session {
            None => bind_params(sql).fetch_optional(&self.pool).await?,
            Some(session) => {
                let mut guard = pg_state(session)?.lock().await;
                let tx = guard.as_mut().ok_or(StoreError::SessionClosed)?;
                bind_params(sql).fetch_optional(&mut **tx).await?
            }
        };
        Ok(row)
    }

    async fn execute(&self, sql: &SqlResult, session: Option<&Session>) -> Result<u64, StoreError> {
        debug!(query = %sql.query, params = sql.params.len(), "pg execute");
        let result = match session {
            None => bind_params(sql).execute(&self.pool).await?,
            Some(session) => {
                let mut guard = pg_state(session)?.lock().await;
                let tx = guard.as_mut().ok_or(StoreError::SessionClosed)?;
                bind_params(sql).execute(&mut **tx).await?
            }
        };
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn ensure_collection(&self, collection: &str) -> Result<(), StoreError> {
        let qb = QueryBuilder::new(collection)?;
        sqlx::query(&qb.create_table()).execute(&self.pool).await?;
        Ok(())
    }

    async fn find(&self, collection: &str, query: &FindQuery, session: Option<&Session>)
        -> Result<Vec<Document>, StoreError> {
        let sql = QueryBuilder::new(collection)?.select(query)?;
        self.fetch_all(&sql, session).await?.iter().map(row_document).collect()
    }

    async fn count(&self, collection: &str, filter: &Filter, session: Option<&Session>) -> Result<u64, StoreError> {
        let sql = QueryBuilder::new(collection)?.count(filter)?;
        let row = self.fetch_optional(&sql, session).await?;
        let count: i64 = match row {
            Some(row) => row.try_get("count")?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    async fn insert(&self, collection: &str, docs: Vec<Document>, session: Option<&Session>)
        -> Result<(), StoreError> {
        if docs.is_empty() {
            return Ok(());
        }
        let sql = QueryBuilder::new(collection)?.insert(&docs)?;
        match self.execute(&sql, session).await {
            Ok(_) => Ok(()),
            Err(StoreError::Sqlx(err)) => Err(map_insert_error(collection, err)),
            Err(err) => Err(err),
        }
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        session: Option<&Session>,
    ) -> Result<Option<Document>, StoreError> {
        let sql = QueryBuilder::new(collection)?.update_one(filter, update)?;
        self.fetch_optional(&sql, session).await?.as_ref().map(row_document).transpose()
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        session: Option<&Session>,
    ) -> Result<u64, StoreError> {
        let sql = QueryBuilder::new(collection)?.update_many(filter, update)?;
        self.execute(&sql, session).await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter, session: Option<&Session>)
        -> Result<Option<Document>, StoreError> {
        let sql = QueryBuilder::new(collection)?.delete_one(filter)?;
        self.fetch_optional(&sql, session).await?.as_ref().map(row_document).transpose()
    }

    async fn delete_many(&self, collection: &str, filter: &Filter, session: Option<&Session>)
        -> Result<u64, StoreError> {
        let sql = QueryBuilder::new(collection)?.delete_many(filter)?;
        self.execute(&sql, session).await
    }

    /// Leading `$match`/`$sort`/`$skip`/`$limit` run in SQL; the remaining
    /// stages are evaluated over the fetched rows.
    async fn aggregate(&self, collection: &str, pipeline: &Pipeline, session: Option<&Session>)
        -> Result<Vec<Document>, StoreError> {
        let (query, rest) = pipeline.pushdown();
        let docs = self.find(collection, &query, session).await?;
        Ok(pipeline::run(rest, docs))
    }

    async fn start_session(&self) -> Result<Session, StoreError> {
        let tx = self.pool.begin().await?;
        let session = Session::new(SessionState::Postgres(Mutex::new(Some(tx))));
        debug!(session = %session.id(), "pg transaction started");
        Ok(session)
    }

    async fn commit(&self, session: Session) -> Result<(), StoreError> {
        let tx = pg_state(&session)?.lock().await.take().ok_or(StoreError::SessionClosed)?;
        tx.commit().await?;
        debug!(session = %session.id(), "pg transaction committed");
        Ok(())
    }

    async fn abort(&self, session: Session) -> Result<(), StoreError> {
        let tx = pg_state(&session)?.lock().await.take().ok_or(StoreError::SessionClosed)?;
        tx.rollback().await?;
        debug!(session = %session.id(), "pg transaction rolled back");
        Ok(())
    }
}
