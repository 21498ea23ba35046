#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use mergedesk_api::auth::jwt::JwtConfig;
use mergedesk_api::auth::password::hash_password;
use mergedesk_api::config::ServerConfig;
use mergedesk_api::router::build_app_router;
use mergedesk_api::state::AppState;
use mergedesk_core::token_cipher::{TokenCipher, DEFAULT_SALT};
use mergedesk_core::types::DbId;
use mergedesk_db::models::gitlab_config::{CreateGitLabConfig, GitLabConfig};
use mergedesk_db::models::user::{CreateUser, User};
use mergedesk_db::repositories::{GitLabConfigRepo, UserRepo};
use mergedesk_gitlab::GitLabApi;
use mergedesk_llm::{Completion, CompletionRequest, LlmError, OllamaConfig, TextCompletion};

pub const TEST_PASSWORD: &str = "test_password_123!";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: String::new(),
        jwt: JwtConfig {
            secret: "test-jwt-secret-that-is-long-enough".to_string(),
            access_token_expiry_mins: 30,
        },
        encryption_key: Some("test-encryption-passphrase".to_string()),
        encryption_key_salt: None,
        ollama: OllamaConfig {
            model: "test-model".to_string(),
            ..OllamaConfig::default()
        },
        gitlab_timeout_secs: 2,
    }
}

/// Language model double that answers every request with the same text,
/// or fails when built with [`StubLlm::offline`].
pub struct StubLlm {
    reply: Option<String>,
}

impl StubLlm {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
        }
    }

    pub fn offline() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl TextCompletion for StubLlm {
    fn model_name(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, LlmError> {
        match &self.reply {
            Some(text) => Ok(Completion::PlainText(text.clone())),
            None => Err(LlmError::InvalidResponse("model offline".into())),
        }
    }

    async fn is_available(&self) -> bool {
        self.reply.is_some()
    }
}

pub fn test_cipher() -> TokenCipher {
    TokenCipher::from_passphrase("test-encryption-passphrase", DEFAULT_SALT)
}

/// Build the application router with the production middleware stack and
/// an offline language model.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_llm(pool, StubLlm::offline())
}

pub fn build_test_app_with_llm(pool: PgPool, llm: StubLlm) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        cipher: Arc::new(test_cipher()),
        gitlab: GitLabApi::new(Duration::from_secs(config.gitlab_timeout_secs))
            .expect("GitLab client should build"),
        llm: Arc::new(llm),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Insert a user directly and return the row.
pub async fn create_test_user(pool: &PgPool, username: &str) -> User {
    let hashed = hash_password(TEST_PASSWORD).expect("hashing should succeed");
    UserRepo::create(
        pool,
        &CreateUser {
            email: format!("{username}@test.com"),
            username: username.to_string(),
            password_hash: hashed,
            full_name: None,
        },
    )
    .await
    .expect("user creation should succeed")
}

/// Create a user and log in through the API, returning the access token.
pub async fn login_token(pool: &PgPool, app: Router, username: &str) -> String {
    login(pool, app, username).await.1
}

/// Create a user and log in through the API, returning the row and token.
pub async fn login(pool: &PgPool, app: Router, username: &str) -> (User, String) {
    let user = create_test_user(pool, username).await;
    let body = serde_json::json!({
        "email": format!("{username}@test.com"),
        "password": TEST_PASSWORD,
    });
    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let json = body_json(response).await;
    let token = json["data"]["access_token"]
        .as_str()
        .expect("login should return an access token")
        .to_string();
    (user, token)
}

/// Insert a configuration directly, bypassing validation.
pub async fn insert_config(
    pool: &PgPool,
    user_id: DbId,
    name: &str,
    url: &str,
    is_active: bool,
) -> GitLabConfig {
    GitLabConfigRepo::create(
        pool,
        user_id,
        &CreateGitLabConfig {
            config_name: Some(name.to_string()),
            gitlab_url: url.to_string(),
            access_token_encrypted: test_cipher()
                .encrypt("glpat-test")
                .expect("encryption should succeed"),
            project_id: Some("42".to_string()),
            is_active,
        },
    )
    .await
    .expect("config creation should succeed")
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    app.oneshot(request).await.expect("request should complete")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}
