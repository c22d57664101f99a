use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use uuid::Uuid;

use crate::app::AppState;
use crate::config::ApiKeyConfig;
use crate::database::models::ApiKeyEntity;
use crate::error::{codes, ApiError};
use crate::services::api_key_service::{open_api_key_payload, validate_hash_api_key};

/// The api key a request came in with
#[derive(Clone, Debug)]
pub struct ApiKeyAuth {
    pub id: Uuid,
    pub key: String,
}

/// Checks `x-api-key: <key>:<sealed payload>` and injects [`ApiKeyAuth`].
pub async fn api_key_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let config = &state.config.api_key;
    let (key, sealed) = extract_api_key(&headers, config)?;

    let api_key = state.api_keys.find_one_by_key(key).await?.ok_or_else(|| {
        ApiError::coded(StatusCode::UNAUTHORIZED, codes::API_KEY_NOT_FOUND, "Api key not found")
    })?;
    verify_api_key(&api_key, key, sealed, config, Utc::now().timestamp_millis())?;

    tracing::debug!(key = %api_key.key, "api key accepted");
    request.extensions_mut().insert(ApiKeyAuth {
        id: api_key.meta.id,
        key: api_key.key,
    });
    Ok(next.run(request).await)
}

fn extract_api_key<'h>(headers: &'h HeaderMap, config: &ApiKeyConfig) -> Result<(&'h str, &'h str), ApiError> {
    let needed = || ApiError::coded(StatusCode::UNAUTHORIZED, codes::API_KEY_NEEDED, "Api key needed");
    let raw = headers
        .get(config.header.as_str())
        .and_then(|v| v.to_str().ok())
        .ok_or_else(needed)?;
    match raw.split_once(':') {
        Some((key, sealed)) if !key.is_empty() && !sealed.is_empty() => Ok((key, sealed)),
        _ => Err(ApiError::coded(
            StatusCode::UNAUTHORIZED,
            codes::API_KEY_INVALID,
            "Api key must be key:payload",
        )),
    }
}

/// Checks the stored key against the sealed payload. `now_ms` is the
/// server clock in epoch milliseconds.
pub fn verify_api_key(
    api_key: &ApiKeyEntity,
    key: &str,
    sealed: &str,
    config: &ApiKeyConfig,
    now_ms: i64,
) -> Result<(), ApiError> {
    if !api_key.is_active {
        return Err(ApiError::coded(StatusCode::FORBIDDEN, codes::API_KEY_INACTIVE, "Api key is inactive"));
    }

    let payload = open_api_key_payload(sealed, &api_key.encryption_key, &api_key.passphrase).ok_or_else(|| {
        ApiError::coded(StatusCode::UNAUTHORIZED, codes::API_KEY_SCHEMA_INVALID, "Api key payload is invalid")
    })?;

    if payload.key != key || !validate_hash_api_key(&payload.hash, &api_key.hash) {
        return Err(ApiError::coded(StatusCode::UNAUTHORIZED, codes::API_KEY_INVALID, "Api key is invalid"));
    }

    if (now_ms - payload.timestamp).abs() > config.timestamp_tolerance_ms {
        return Err(ApiError::coded(
            StatusCode::UNAUTHORIZED,
            codes::API_KEY_TIMESTAMP_INVALID,
            "Api key timestamp is outside the accepted window",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::EntityMeta;
    use crate::services::api_key_service::{create_hash_api_key, seal_api_key_payload};
    use crate::services::ApiKeyPayload;

    const NOW: i64 = 1_700_000_000_000;

    fn entity() -> ApiKeyEntity {
        ApiKeyEntity {
            meta: EntityMeta::new(),
            name: "client".into(),
            description: None,
            key: "key".into(),
            hash: create_hash_api_key("key", "secret"),
            encryption_key: "ek".into(),
            passphrase: "pp".into(),
            is_active: true,
        }
    }

    fn sealed(key: &str, secret: &str, timestamp: i64) -> String {
        let payload = ApiKeyPayload {
            key: key.into(),
            timestamp,
            hash: create_hash_api_key(key, secret),
        };
        seal_api_key_payload(&payload, "ek", "pp").unwrap()
    }

    fn code(result: Result<(), ApiError>) -> &'static str {
        result.unwrap_err().error_code()
    }

    #[test]
    fn test_verify_api_key() {
        let config = AppConfig::development().api_key;
        let api_key = entity();

        assert!(verify_api_key(&api_key, "key", &sealed("key", "secret", NOW), &config, NOW).is_ok());
        assert_eq!(code(verify_api_key(&api_key, "key", "junk", &config, NOW)), codes::API_KEY_SCHEMA_INVALID);
        assert_eq!(
            code(verify_api_key(&api_key, "key", &sealed("key", "wrong", NOW), &config, NOW)),
            codes::API_KEY_INVALID
        );
        assert_eq!(
            code(verify_api_key(&api_key, "key", &sealed("other", "secret", NOW), &config, NOW)),
            codes::API_KEY_INVALID
        );
        let stale = NOW - config.timestamp_tolerance_ms - 1;
        assert_eq!(
            code(verify_api_key(&api_key, "key", &sealed("key", "secret", stale), &config, NOW)),
            codes::API_KEY_TIMESTAMP_INVALID
        );

        let inactive = ApiKeyEntity { is_active: false, ..entity() };
        assert_eq!(
            code(verify_api_key(&inactive, "key", &sealed("key", "secret", NOW), &config, NOW)),
            codes::API_KEY_INACTIVE
        );
    }

    #[test]
    fn test_extract_api_key() {
        let config = AppConfig::development().api_key;
        let mut headers = HeaderMap::new();
        assert_eq!(extract_api_key(&headers, &config).unwrap_err().error_code(), codes::API_KEY_NEEDED);
        headers.insert("x-api-key", "nocolon".parse().unwrap());
        assert_eq!(extract_api_key(&headers, &config).unwrap_err().error_code(), codes::API_KEY_INVALID);
        headers.insert("x-api-key", "key:a.b".parse().unwrap());
        assert_eq!(extract_api_key(&headers, &config).unwrap(), ("key", "a.b"));
    }
}
