use std::sync::Arc;

use mergedesk_core::token_cipher::TokenCipher;
use mergedesk_gitlab::GitLabApi;
use mergedesk_llm::TextCompletion;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: mergedesk_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Encrypts and decrypts stored GitLab access tokens.
    pub cipher: Arc<TokenCipher>,
    /// Shared GitLab REST client.
    pub gitlab: GitLabApi,
    /// Language model used for chat and selection prompts.
    pub llm: Arc<dyn TextCompletion>,
}
