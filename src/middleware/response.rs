use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::api::PaginationMeta;

/// Wrapper for API responses that automatically adds success envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
    pub pagination: Option<PaginationMeta>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None, // Default to 200 OK
            pagination: None,
        }
    }

    /// Create an API response with custom status code
    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
            pagination: None,
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    /// List page with its `_pagination` block
    pub fn paginated(data: T, pagination: PaginationMeta) -> Self {
        Self {
            data,
            status_code: None,
            pagination: Some(pagination),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }

        // Convert data to JSON Value for consistent envelope format
        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": true,
                        "message": "Failed to serialize response data",
                        "code": "INTERNAL_SERVER_ERROR"
                    })),
                )
                    .into_response();
            }
        };

        let mut envelope = json!({
            "success": true,
            "data": data_value
        });
        if let Some(pagination) = self.pagination {
            envelope["_pagination"] = json!(pagination);
        }

        (status, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_envelope() {
        let response = ApiResponse::created(json!({"_id": "x"})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body(response).await, json!({"success": true, "data": {"_id": "x"}}));
    }

    #[tokio::test]
    async fn test_paginated_envelope() {
        let meta = PaginationMeta {
            total_data: 1,
            total_page: 1,
            current_page: 1,
            per_page: 20,
            available_search: vec!["name".into()],
            available_sort: vec!["name".into()],
        };
        let value = body(ApiResponse::paginated(vec![1], meta).into_response()).await;
        assert_eq!(value["_pagination"]["totalData"], 1);
        assert_eq!(value["_pagination"]["perPage"], 20);
        assert_eq!(value["data"], json!([1]));
    }
}
