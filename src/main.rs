use ack_api_rust::auth::AuthService;
use ack_api_rust::config::{self, DatabaseEngine};
use ack_api_rust::database::DatabaseManager;
use ack_api_rust::services::seed;
use ack_api_rust::{app, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, APP_ENV, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config().clone();
    tracing::info!("Starting {} {} in {:?} mode", config.app.name, config.app.version, config.environment);

    let store = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::migrate(store.as_ref()).await?;

    // An in-memory store starts empty every time; seed it so the server is usable.
    if config.database.engine == DatabaseEngine::Memory {
        let auth = AuthService::new(config.auth.clone());
        seed::seed(store.clone(), &auth).await?;
        tracing::info!("Seeded in-memory store");
    }

    let bind_addr = format!("{}:{}", config.app.host, config.app.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app(AppState::new(config, store))).await?;
    Ok(())
}
