use serde_json::Value;
use sqlx::postgres::PgArguments;

use crate::database::store::{document_id, validate_collection, Document, FindQuery, StoreError, Update};
use crate::filter::types::SqlResult;
use crate::filter::{Filter, FilterOrder, FilterWhere, Projection};

/// SQL generation for one collection table `(id TEXT PRIMARY KEY, doc JSONB)`.
/// Every parameter is bound as JSONB, in order.
pub struct QueryBuilder {
    table_name: String,
}

impl QueryBuilder {
    pub fn new(collection: &str) -> Result<Self, StoreError> {
        validate_collection(collection)?;
        Ok(Self { table_name: format!("\"{}\"", collection) })
    }

    pub fn create_table(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, doc JSONB NOT NULL)",
            self.table_name
        )
    }

    pub fn select(&self, query: &FindQuery) -> Result<SqlResult, StoreError> {
        let (where_sql, params) = FilterWhere::generate(&query.filter, 0)?;
        let mut sql = format!(
            "SELECT {} AS doc FROM {} WHERE {}",
            Self::projection_expr(query.projection.as_ref()),
            self.table_name,
            where_sql
        );
        let order = FilterOrder::generate(&query.sort)?;
        if !order.is_empty() {
            sql.push(' ');
            sql.push_str(&order);
        }
        // Postgres takes bigint for both.
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit.min(i64::MAX as u64)));
        }
        if query.skip > 0 {
            sql.push_str(&format!(" OFFSET {}", query.skip.min(i64::MAX as u64)));
        }
        Ok(SqlResult { query: sql, params })
    }

    pub fn count(&self, filter: &Filter) -> Result<SqlResult, StoreError> {
        let (where_sql, params) = FilterWhere::generate(filter, 0)?;
        Ok(SqlResult {
            query: format!("SELECT COUNT(*) AS count FROM {} WHERE {}", self.table_name, where_sql),
            params,
        })
    }

    pub fn insert(&self, docs: &[Document]) -> Result<SqlResult, StoreError> {
        let mut rows = Vec::with_capacity(docs.len());
        let mut params = Vec::with_capacity(docs.len() * 2);
        for doc in docs {
            let id = document_id(doc)?;
            params.push(Value::String(id.to_string()));
            params.push(Value::Object(doc.clone()));
            rows.push(format!("((${}::jsonb #>> '{{}}'), ${}::jsonb)", params.len() - 1, params.len()));
        }
        Ok(SqlResult {
            query: format!("INSERT INTO {} (id, doc) VALUES {}", self.table_name, rows.join(", ")),
            params,
        })
    }

    pub fn update_one(&self, filter: &Filter, update: &Update) -> Result<SqlResult, StoreError> {
        let (where_sql, mut params) = FilterWhere::generate(filter, 0)?;
        let set_expr = Self::update_expr("t.doc", update, &mut params);
        Ok(SqlResult {
            query: format!(
                "WITH target AS (SELECT id FROM {table} WHERE {where_sql} LIMIT 1 FOR UPDATE) \
                 UPDATE {table} AS t SET doc = {set_expr} FROM target WHERE t.id = target.id RETURNING t.doc",
                table = self.table_name,
            ),
            params,
        })
    }

    pub fn update_many(&self, filter: &Filter, update: &Update) -> Result<SqlResult, StoreError> {
        let (where_sql, mut params) = FilterWhere::generate(filter, 0)?;
        let set_expr = Self::update_expr("doc", update, &mut params);
        Ok(SqlResult {
            query: format!("UPDATE {} SET doc = {} WHERE {}", self.table_name, set_expr, where_sql),
            params,
        })
    }

    pub fn delete_one(&self, filter: &Filter) -> Result<SqlResult, StoreError> {
        let (where_sql, params) = FilterWhere::generate(filter, 0)?;
        Ok(SqlResult {
            query: format!(
                "WITH target AS (SELECT id FROM {table} WHERE {where_sql} LIMIT 1 FOR UPDATE) \
                 DELETE FROM {table} AS t USING target WHERE t.id = target.id RETURNING t.doc",
                table = self.table_name,
            ),
            params,
        })
    }

    pub fn delete_many(&self, filter: &Filter) -> Result<SqlResult, StoreError> {
        let (where_sql, params) = FilterWhere::generate(filter, 0)?;
        Ok(SqlResult {
            query: format!("DELETE FROM {} WHERE {}", self.table_name, where_sql),
            params,
        })
    }

    fn update_expr(column: &str, update: &Update, params: &mut Vec<Value>) -> String {
        params.push(Value::Object(update.set.clone()));
        let set_index = params.len();
        if update.unset.is_empty() {
            return format!("({} || ${}::jsonb)", column, set_index);
        }
        params.push(Value::Array(update.unset.iter().cloned().map(Value::String).collect()));
        format!(
            "(({} || ${}::jsonb) - ARRAY(SELECT jsonb_array_elements_text(${}::jsonb)))",
            column,
            set_index,
            params.len()
        )
    }

    /// Field names are validated identifiers, safe to inline.
    fn projection_expr(projection: Option<&Projection>) -> String {
        match projection {
            None => "doc".to_string(),
            Some(Projection::Exclude(fields)) => {
                let keys: Vec<String> = fields.iter().map(|f| format!("'{}'", f)).collect();
                format!("(doc - ARRAY[{}]::text[])", keys.join(", "))
            }
            Some(Projection::Include(fields)) => {
                let mut keys: Vec<String> = vec!["'_id'".to_string()];
                keys.extend(fields.iter().map(|f| format!("'{}'", f)));
                format!(
                    "(SELECT COALESCE(jsonb_object_agg(key, value), '{{}}'::jsonb) FROM jsonb_each(doc) \
                     WHERE key = ANY(ARRAY[{}]::text[]))",
                    keys.join(", ")
                )
            }
        }
    }
}

pub fn bind_params<'q>(sql: &'q SqlResult) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = q.bind(p.clone());
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Sort, SortOrder};
    use serde_json::json;

    #[test]
    fn builds_paged_select() {
        let qb = QueryBuilder::new("users").unwrap();
        let sql = qb
            .select(&FindQuery {
                filter: Filter::exists("deletedAt", false),
                sort: Sort::by("createdAt", SortOrder::Desc),
                skip: 20,
                limit: Some(10),
                projection: Some(Projection::Exclude(vec!["password".into()])),
            })
            .unwrap();
        assert_eq!(
            sql.query,
            "SELECT (doc - ARRAY['password']::text[]) AS doc FROM \"users\" \
             WHERE COALESCE((doc #> '{deletedAt}'), 'null'::jsonb) = 'null'::jsonb \
             ORDER BY doc #> '{createdAt}' DESC NULLS LAST LIMIT 10 OFFSET 20"
        );
        assert!(sql.params.is_empty());
    }

    #[test]
    fn paging_is_clamped_to_bigint() {
        let qb = QueryBuilder::new("users").unwrap();
        let sql = qb
            .select(&FindQuery { skip: u64::MAX, limit: Some(u64::MAX), ..Default::default() })
            .unwrap();
        assert!(sql.query.ends_with(&format!(" LIMIT {} OFFSET {}", i64::MAX, i64::MAX)));
    }

    #[test]
    fn update_params_follow_filter_params() {
        let qb = QueryBuilder::new("users").unwrap();
        let update = Update::default().with("isActive", json!(false)).unset("deletedAt");
        let sql = qb.update_many(&Filter::eq("username", "a"), &update).unwrap();
        assert_eq!(
            sql.query,
            "UPDATE \"users\" SET doc = ((doc || $2::jsonb) - ARRAY(SELECT jsonb_array_elements_text($3::jsonb))) \
             WHERE (doc #> '{username}') = $1::jsonb"
        );
        assert_eq!(sql.params, vec![json!("a"), json!({ "isActive": false }), json!(["deletedAt"])]);
    }

    #[test]
    fn insert_requires_ids() {
        let qb = QueryBuilder::new("users").unwrap();
        let doc = json!({ "name": "x" }).as_object().cloned().unwrap();
        assert!(matches!(qb.insert(&[doc]), Err(StoreError::MissingId)));
    }

    #[test]
    fn rejects_bad_collection_names() {
        assert!(QueryBuilder::new("users\"; --").is_err());
    }
}
