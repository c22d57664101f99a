pub mod api_key;
pub mod database;

use std::sync::Arc;

use crate::config;
use crate::database::{DatabaseManager, DocumentStore};

/// Connects to the configured engine and makes sure every collection exists.
pub(crate) async fn open_store() -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store = DatabaseManager::connect(&config::config().database).await?;
    DatabaseManager::migrate(store.as_ref()).await?;
    Ok(store)
}
