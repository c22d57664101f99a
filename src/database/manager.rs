use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;

use crate::config::{DatabaseConfig, DatabaseEngine};
use crate::database::memory::MemoryStore;
use crate::database::models;
use crate::database::postgres::PgStore;
use crate::database::store::{DocumentStore, StoreError};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid database name: {0}")]
    InvalidDatabaseName(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Opens the configured storage engine.
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
        match config.engine {
            DatabaseEngine::Memory => {
                info!("Using in-memory document store");
                Ok(Arc::new(MemoryStore::new()))
            }
            DatabaseEngine::Postgres => {
                let connection_string = Self::build_connection_string(config)?;
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(Duration::from_secs(config.connection_timeout))
                    .connect(&connection_string)
                    .await?;
                info!("Created database pool (max {} connections)", config.max_connections);
                Ok(Arc::new(PgStore::new(pool)))
            }
        }
    }

    /// Create every entity collection. Idempotent.
    pub async fn migrate(store: &dyn DocumentStore) -> Result<(), DatabaseError> {
        for collection in models::COLLECTIONS {
            store.ensure_collection(collection).await?;
            info!("Ensured collection: {}", collection);
        }
        Ok(())
    }

    pub async fn health_check(store: &dyn DocumentStore) -> Result<(), DatabaseError> {
        store.ping().await?;
        Ok(())
    }

    fn build_connection_string(config: &DatabaseConfig) -> Result<String, DatabaseError> {
        let base = config.url.as_deref().ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let mut url = url::Url::parse(base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if let Some(name) = &config.name {
            if !Self::is_valid_db_name(name) {
                return Err(DatabaseError::InvalidDatabaseName(name.clone()));
            }
            url.set_path(&format!("/{}", name));
        }
        Ok(url.into())
    }

    fn is_valid_db_name(name: &str) -> bool {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}
