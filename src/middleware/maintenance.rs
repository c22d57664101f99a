use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::error::{codes, ApiError};

/// Answers 503 while the `maintenance` setting is on.
pub async fn maintenance_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.settings.maintenance().await? {
        return Err(ApiError::coded(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::APP_IN_MAINTENANCE,
            "Service is under maintenance",
        ));
    }
    Ok(next.run(request).await)
}
