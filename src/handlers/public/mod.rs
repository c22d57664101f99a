// handlers/public/mod.rs - Public handlers (no credentials required)
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::database::DatabaseManager;

/// GET / - service banner
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": {
            "name": state.config.app.name,
            "version": env!("CARGO_PKG_VERSION"),
            "apiVersion": state.config.app.version,
            "environment": state.config.environment,
            "endpoints": {
                "health": "/health (public)",
                "user": "/api/v1/user/* (api key)",
                "setting": "/api/v1/setting/* (api key)",
                "admin": "/api/v1/admin/* (api key + access token)",
            }
        }
    }))
}

/// GET /health - storage engine reachability
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(state.store.as_ref()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": state.store.engine()
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": true,
                    "message": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
