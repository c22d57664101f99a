use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub app: AppSection,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub api_key: ApiKeyConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub engine: DatabaseEngine,
    pub url: Option<String>,
    /// Replaces the database path of `url` when set.
    pub name: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_subject: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_secret: String,
    pub access_token_expiry_secs: i64,
    pub refresh_token_secret: String,
    pub refresh_token_expiry_secs: i64,
    pub refresh_token_remember_me_expiry_secs: i64,
    pub refresh_token_not_before_secs: i64,
    pub password_expired_in_days: i64,
    pub password_max_attempt: u32,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    pub header: String,
    /// Accepted clock skew of the sealed payload timestamp, in milliseconds.
    pub timestamp_tolerance_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

const MINUTE: i64 = 60;
const DAY: i64 = 24 * 60 * MINUTE;

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // App overrides
        if let Ok(v) = env::var("APP_NAME") {
            self.app.name = v;
        }
        if let Ok(v) = env::var("HTTP_HOST") {
            self.app.host = v;
        }
        if let Ok(v) = env::var("HTTP_PORT").or_else(|_| env::var("PORT")) {
            self.app.port = v.parse().unwrap_or(self.app.port);
        }
        if let Ok(v) = env::var("APP_VERSION") {
            self.app.version = v;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_ENGINE") {
            self.database.engine = match v.to_ascii_lowercase().as_str() {
                "memory" => DatabaseEngine::Memory,
                "postgres" | "postgresql" => DatabaseEngine::Postgres,
                _ => self.database.engine,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_NAME") {
            self.database.name = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_DEBUG") {
            self.database.debug = v.parse().unwrap_or(self.database.debug);
        }

        // Auth overrides
        if let Ok(v) = env::var("AUTH_JWT_SUBJECT") {
            self.auth.jwt_subject = v;
        }
        if let Ok(v) = env::var("AUTH_JWT_AUDIENCE") {
            self.auth.jwt_audience = v;
        }
        if let Ok(v) = env::var("AUTH_JWT_ISSUER") {
            self.auth.jwt_issuer = v;
        }
        if let Ok(v) = env::var("AUTH_JWT_ACCESS_TOKEN_SECRET_KEY") {
            self.auth.access_token_secret = v;
        }
        if let Ok(v) = env::var("AUTH_JWT_ACCESS_TOKEN_EXPIRED") {
            self.auth.access_token_expiry_secs = v.parse().unwrap_or(self.auth.access_token_expiry_secs);
        }
        if let Ok(v) = env::var("AUTH_JWT_REFRESH_TOKEN_SECRET_KEY") {
            self.auth.refresh_token_secret = v;
        }
        if let Ok(v) = env::var("AUTH_JWT_REFRESH_TOKEN_EXPIRED") {
            self.auth.refresh_token_expiry_secs = v.parse().unwrap_or(self.auth.refresh_token_expiry_secs);
        }
        if let Ok(v) = env::var("AUTH_JWT_REFRESH_TOKEN_REMEMBER_ME_EXPIRED") {
            self.auth.refresh_token_remember_me_expiry_secs =
                v.parse().unwrap_or(self.auth.refresh_token_remember_me_expiry_secs);
        }
        if let Ok(v) = env::var("AUTH_JWT_REFRESH_TOKEN_NOT_BEFORE_EXPIRATION") {
            self.auth.refresh_token_not_before_secs = v.parse().unwrap_or(self.auth.refresh_token_not_before_secs);
        }
        if let Ok(v) = env::var("AUTH_PASSWORD_EXPIRED_IN_DAYS") {
            self.auth.password_expired_in_days = v.parse().unwrap_or(self.auth.password_expired_in_days);
        }
        if let Ok(v) = env::var("AUTH_PASSWORD_MAX_ATTEMPT") {
            self.auth.password_max_attempt = v.parse().unwrap_or(self.auth.password_max_attempt);
        }
        if let Ok(v) = env::var("AUTH_BCRYPT_COST") {
            self.auth.bcrypt_cost = v.parse().unwrap_or(self.auth.bcrypt_cost);
        }

        // API key overrides
        if let Ok(v) = env::var("API_KEY_TIMESTAMP_TOLERANCE_MS") {
            self.api_key.timestamp_tolerance_ms = v.parse().unwrap_or(self.api_key.timestamp_tolerance_ms);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            app: AppSection {
                name: "ack".to_string(),
                host: "127.0.0.1".to_string(),
                port: 3000,
                version: "1".to_string(),
            },
            database: DatabaseConfig {
                engine: DatabaseEngine::Postgres,
                url: None,
                name: None,
                max_connections: 10,
                connection_timeout: 30,
                debug: true,
            },
            auth: AuthConfig {
                jwt_subject: "ackDevelopment".to_string(),
                jwt_audience: "https://example.com".to_string(),
                jwt_issuer: "ack".to_string(),
                access_token_secret: "1234567890".to_string(),
                access_token_expiry_secs: 30 * MINUTE,
                refresh_token_secret: "0987654321".to_string(),
                refresh_token_expiry_secs: 7 * DAY,
                refresh_token_remember_me_expiry_secs: 30 * DAY,
                refresh_token_not_before_secs: 30 * MINUTE,
                password_expired_in_days: 182,
                password_max_attempt: 3,
                bcrypt_cost: 8,
            },
            api_key: ApiKeyConfig {
                header: "x-api-key".to_string(),
                timestamp_tolerance_ms: 5 * MINUTE * 1000,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.database.debug = false;
        config.auth.jwt_subject = "ackStaging".to_string();
        config.auth.bcrypt_cost = 10;
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.app.host = "0.0.0.0".to_string();
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.database.debug = false;
        config.auth.jwt_subject = "ackProduction".to_string();
        config.auth.bcrypt_cost = 12;
        config.api_key.timestamp_tolerance_ms = MINUTE * 1000;
        config.security.cors_origins = vec!["https://app.example.com".to_string()];
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.database.engine, DatabaseEngine::Postgres);
        assert_eq!(config.auth.access_token_expiry_secs, 1800);
        assert_eq!(config.auth.password_max_attempt, 3);
        assert!(config.database.debug);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.environment, Environment::Production);
        assert!(!config.database.debug);
        assert!(config.auth.bcrypt_cost >= 10);
        assert!(config.api_key.timestamp_tolerance_ms < AppConfig::development().api_key.timestamp_tolerance_ms);
    }
}
