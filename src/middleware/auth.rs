use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use futures::future::BoxFuture;

use crate::app::AppState;
use crate::auth::{RefreshClaims, UserPayload};
use crate::database::models::AccessFor;
use crate::error::{codes, ApiError};

/// Authenticated user context extracted from an access token
#[derive(Clone, Debug)]
pub struct AuthUser(pub UserPayload);

/// Refresh token claims, for the refresh endpoint only
#[derive(Clone, Debug)]
pub struct RefreshUser(pub RefreshClaims);

/// Validates the bearer access token and injects [`AuthUser`].
pub async fn jwt_access_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(access_invalid)?;
    let claims = state
        .auth
        .validate_access_token(&token)
        .map_err(|e| access_invalid(format!("Invalid JWT token: {}", e)))?;

    request.extensions_mut().insert(AuthUser(claims.user));
    Ok(next.run(request).await)
}

/// Validates the bearer refresh token and injects [`RefreshUser`].
pub async fn jwt_refresh_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(refresh_invalid)?;
    let claims = state
        .auth
        .validate_refresh_token(&token)
        .map_err(|e| refresh_invalid(format!("Invalid JWT token: {}", e)))?;

    request.extensions_mut().insert(RefreshUser(claims));
    Ok(next.run(request).await)
}

fn access_invalid(message: String) -> ApiError {
    ApiError::coded(StatusCode::UNAUTHORIZED, codes::AUTH_JWT_ACCESS_TOKEN_INVALID, message)
}

fn refresh_invalid(message: String) -> ApiError {
    ApiError::coded(StatusCode::UNAUTHORIZED, codes::AUTH_JWT_REFRESH_TOKEN_INVALID, message)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

/// ADMIN roles must hold every code in `required`; SUPER_ADMIN skips the check.
pub fn check_admin_access(user: &UserPayload, required: &[&str]) -> Result<(), ApiError> {
    match user.role.access_for {
        AccessFor::SuperAdmin => Ok(()),
        AccessFor::Admin => {
            let missing: Vec<&str> = required
                .iter()
                .copied()
                .filter(|code| !user.role.permissions.iter().any(|p| p == code))
                .collect();
            if missing.is_empty() {
                Ok(())
            } else {
                Err(ApiError::coded(
                    StatusCode::FORBIDDEN,
                    codes::AUTH_PERMISSION_INVALID,
                    format!("Missing permission: {}", missing.join(", ")),
                ))
            }
        }
        AccessFor::User => Err(ApiError::coded(
            StatusCode::FORBIDDEN,
            codes::AUTH_ACCESS_FOR_INVALID,
            "Admin access required",
        )),
    }
}

/// Route layer enforcing [`check_admin_access`]. Must sit inside
/// [`jwt_access_middleware`].
pub fn require_admin(
    required: &'static [&'static str],
) -> impl Fn(Request, Next) -> BoxFuture<'static, Result<Response, ApiError>> + Clone + Send + Sync + 'static {
    move |request: Request, next: Next| -> BoxFuture<'static, Result<Response, ApiError>> {
        Box::pin(async move {
            match request.extensions().get::<AuthUser>() {
                Some(AuthUser(user)) => check_admin_access(user, required)?,
                None => return Err(access_invalid("Missing authenticated user".to_string())),
            }
            Ok(next.run(request).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RolePayload;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(access_for: AccessFor, permissions: &[&str]) -> UserPayload {
        UserPayload {
            id: Uuid::new_v4(),
            username: "u".into(),
            first_name: "f".into(),
            last_name: "l".into(),
            email: "u@mail.com".into(),
            mobile_number: None,
            role: RolePayload {
                name: "r".into(),
                access_for,
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            },
            is_active: true,
            password_expired: Utc::now(),
        }
    }

    #[test]
    fn test_admin_access_rules() {
        assert!(check_admin_access(&user(AccessFor::SuperAdmin, &[]), &["USER_READ"]).is_ok());
        assert!(check_admin_access(&user(AccessFor::Admin, &["USER_READ"]), &["USER_READ"]).is_ok());

        let err = check_admin_access(&user(AccessFor::Admin, &["USER_READ"]), &["USER_READ", "USER_CREATE"]).unwrap_err();
        assert_eq!(err.error_code(), codes::AUTH_PERMISSION_INVALID);

        let err = check_admin_access(&user(AccessFor::User, &["USER_READ"]), &["USER_READ"]).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.error_code(), codes::AUTH_ACCESS_FOR_INVALID);
    }

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        assert!(extract_jwt_from_headers(&headers).is_err());
        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert!(extract_jwt_from_headers(&headers).is_err());
        headers.insert("authorization", "Bearer abc".parse().unwrap());
        assert_eq!(extract_jwt_from_headers(&headers).unwrap(), "abc");
    }
}
