#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use ack_api_rust::config::{AppConfig, DatabaseEngine};
use ack_api_rust::database::{DatabaseManager, DocumentStore, MemoryStore};
use ack_api_rust::services::api_key_service::{create_hash_api_key, seal_api_key_payload};
use ack_api_rust::services::seed::{self, default_api_key, SeedSummary, DEFAULT_PASSWORD};
use ack_api_rust::services::ApiKeyPayload;
use ack_api_rust::{app, AppState};
use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// The server binary, spawned once per test file on a free port over
/// the in-memory engine.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ack-api-rust"));
        cmd.env("DATABASE_ENGINE", "memory")
            .env("HTTP_HOST", "127.0.0.1")
            .env("HTTP_PORT", port.to_string())
            .env("AUTH_BCRYPT_COST", "4")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// In-process router over a freshly seeded in-memory store.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub seeded: SeedSummary,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }

    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.engine = DatabaseEngine::Memory;
    config.auth.bcrypt_cost = 4;
    config.auth.refresh_token_not_before_secs = 0;
    config
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        DatabaseManager::migrate(store.as_ref()).await?;

        let state = AppState::new(config, store.clone());
        let seeded = seed::seed(store, &state.auth).await?;

        Ok(Self {
            router: app(state.clone()),
            state,
            seeded,
        })
    }

    /// `x-api-key` value for the seeded default key, stamped now.
    pub fn api_key_header(&self) -> Result<String> {
        let raw = default_api_key();
        sealed_header(
            &raw.key,
            &raw.secret,
            &raw.encryption_key,
            &raw.passphrase,
            chrono::Utc::now().timestamp_millis(),
        )
    }

    /// Sends a request carrying the default api key.
    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<TestResponse> {
        let api_key = self.api_key_header()?;
        self.send(method, uri, Some(&api_key), token, body).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        api_key: Option<&str>,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(api_key) = api_key {
            builder = builder.header("x-api-key", api_key);
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(TestResponse { status, body })
    }

    /// Logs a seeded user in with the default password.
    pub async fn login(&self, username: &str) -> Result<TestResponse> {
        self.call(
            Method::POST,
            "/api/v1/user/login",
            None,
            Some(serde_json::json!({ "username": username, "password": DEFAULT_PASSWORD })),
        )
        .await
    }

    pub async fn access_token(&self, username: &str) -> Result<String> {
        let res = self.login(username).await?;
        anyhow::ensure!(res.status == StatusCode::OK, "login failed: {} {}", res.status, res.body);
        res.data()["accessToken"]
            .as_str()
            .map(str::to_string)
            .context("missing accessToken")
    }
}

pub fn sealed_header(key: &str, secret: &str, encryption_key: &str, passphrase: &str, timestamp: i64) -> Result<String> {
    let payload = ApiKeyPayload {
        key: key.to_string(),
        timestamp,
        hash: create_hash_api_key(key, secret),
    };
    let sealed = seal_api_key_payload(&payload, encryption_key, passphrase)?;
    Ok(format!("{}:{}", key, sealed))
}
