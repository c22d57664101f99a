use serde_json::json;

use crate::auth::AuthService;
use crate::cli::commands::open_store;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::models::COLLECTIONS;
use crate::services::seed as seeder;

pub async fn migrate(output_format: OutputFormat) -> anyhow::Result<()> {
    open_store().await?;
    output_success(
        &output_format,
        "Collections ready",
        Some(json!({ "collections": COLLECTIONS })),
    )
}

pub async fn seed(output_format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store().await?;
    let auth = AuthService::new(config::config().auth.clone());
    let summary = seeder::seed(store, &auth).await?;

    output_success(
        &output_format,
        "Seeded permissions, roles, users, settings and the default api key",
        Some(json!({
            "roles": {
                "superadmin": summary.super_admin_role,
                "admin": summary.admin_role,
                "user": summary.user_role,
            },
            "apiKey": summary.api_key,
        })),
    )
}

pub async fn remove(output_format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store().await?;
    seeder::remove(store).await?;
    output_success(&output_format, "Removed seeded data", None)
}
