use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::database::models::{AccessFor, UserDoc};

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("token secret is not configured")]
    InvalidSecret,
}

/// Fresh password hash together with the moment it stops being valid.
#[derive(Debug, Clone)]
pub struct PasswordHash {
    pub password_hash: String,
    pub password_expired: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePayload {
    pub name: String,
    pub access_for: AccessFor,
    pub permissions: Vec<String>,
}

/// User as carried inside an access token: no password, role flattened to
/// its name, audience and active permission codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
    pub role: RolePayload,
    pub is_active: bool,
    pub password_expired: DateTime<Utc>,
}

impl From<&UserDoc> for UserPayload {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.meta.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            mobile_number: user.mobile_number.clone(),
            role: RolePayload {
                name: user.role.name.clone(),
                access_for: user.role.access_for,
                permissions: user.role.active_permission_codes(),
            },
            is_active: user.is_active,
            password_expired: user.password_expired,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(flatten)]
    pub user: UserPayload,
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub remember_me: bool,
    pub login_date: DateTime<Utc>,
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Password hashing and token issuing. Holds its own copy of the auth
/// settings so tests can run with cheap bcrypt costs and no delays.
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn create_password(&self, password: &str) -> Result<PasswordHash, AuthError> {
        let password_hash = bcrypt::hash(password, self.config.bcrypt_cost)?;
        Ok(PasswordHash {
            password_hash,
            password_expired: Utc::now() + Duration::days(self.config.password_expired_in_days),
        })
    }

    /// Malformed stored hashes count as a mismatch.
    pub fn validate_password(&self, password: &str, password_hash: &str) -> bool {
        bcrypt::verify(password, password_hash).unwrap_or(false)
    }

    pub fn check_password_expired(&self, password_expired: DateTime<Utc>) -> bool {
        Utc::now() > password_expired
    }

    pub fn access_token_expiry_secs(&self) -> i64 {
        self.config.access_token_expiry_secs
    }

    pub fn create_access_token(&self, user: &UserPayload) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = AccessClaims {
            user: user.clone(),
            sub: self.config.jwt_subject.clone(),
            aud: self.config.jwt_audience.clone(),
            iss: self.config.jwt_issuer.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.config.access_token_expiry_secs)).timestamp(),
        };
        sign(&claims, &self.config.access_token_secret)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let secret = non_empty(&self.config.access_token_secret)?;
        let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &self.validation(false))?;
        Ok(data.claims)
    }

    /// Refresh tokens only become usable after the configured delay and live
    /// longer when the user asked to be remembered.
    pub fn create_refresh_token(
        &self,
        user_id: Uuid,
        remember_me: bool,
        login_date: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let expiry = if remember_me {
            self.config.refresh_token_remember_me_expiry_secs
        } else {
            self.config.refresh_token_expiry_secs
        };
        let claims = RefreshClaims {
            id: user_id,
            remember_me,
            login_date,
            sub: self.config.jwt_subject.clone(),
            aud: self.config.jwt_audience.clone(),
            iss: self.config.jwt_issuer.clone(),
            iat: now.timestamp(),
            nbf: (now + Duration::seconds(self.config.refresh_token_not_before_secs)).timestamp(),
            exp: (now + Duration::seconds(expiry)).timestamp(),
        };
        sign(&claims, &self.config.refresh_token_secret)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let secret = non_empty(&self.config.refresh_token_secret)?;
        let data = decode::<RefreshClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &self.validation(true))?;
        Ok(data.claims)
    }

    fn validation(&self, check_nbf: bool) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.sub = Some(self.config.jwt_subject.clone());
        validation.validate_nbf = check_nbf;
        validation
    }
}

fn non_empty(secret: &str) -> Result<&str, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }
    Ok(secret)
}

fn sign<C: Serialize>(claims: &C, secret: &str) -> Result<String, AuthError> {
    let secret = non_empty(secret)?;
    Ok(encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}
