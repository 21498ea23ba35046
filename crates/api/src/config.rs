use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use mergedesk_llm::OllamaConfig;

use crate::auth::jwt::JwtConfig;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL and JWT secret have defaults suitable
/// for local development.
#[derive(Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub database_url: String,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Raw key or passphrase for the token cipher. `None` generates a key.
    pub encryption_key: Option<String>,
    /// Optional base64 per-installation salt for passphrase derivation.
    pub encryption_key_salt: Option<String>,
    pub ollama: OllamaConfig,
    /// Bound on each GitLab request in seconds (default: `10`).
    pub gitlab_timeout_secs: u64,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cors_origins", &self.cors_origins)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("ollama", &self.ollama)
            .field("gitlab_timeout_secs", &self.gitlab_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                       |
    /// |------------------------|-----------------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                                     |
    /// | `PORT`                 | `3000`                                        |
    /// | `CORS_ORIGINS`         | `http://localhost:5173,http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                                          |
    /// | `DATABASE_URL`         | required                                      |
    /// | `ENCRYPTION_KEY`       | unset (random key per process)                |
    /// | `ENCRYPTION_KEY_SALT`  | unset (fixed application salt)                |
    /// | `OLLAMA_BASE_URL`      | `http://localhost:11434`                      |
    /// | `OLLAMA_MODEL`         | `llama3.2`                                    |
    /// | `LLM_TIMEOUT_SECS`     | `120`                                         |
    /// | `GITLAB_TIMEOUT_SECS`  | `10`                                          |
    ///
    /// JWT settings are documented on [`JwtConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_var("PORT", "3000")?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", "30")?;

        let database_url = optional_var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let jwt = JwtConfig::from_env()?;

        let ollama = OllamaConfig {
            base_url: optional_var("OLLAMA_BASE_URL")
                .unwrap_or_else(|| mergedesk_llm::ollama::DEFAULT_BASE_URL.into()),
            model: optional_var("OLLAMA_MODEL")
                .unwrap_or_else(|| mergedesk_llm::ollama::DEFAULT_MODEL.into()),
            timeout: Duration::from_secs(parse_var("LLM_TIMEOUT_SECS", "120")?),
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url,
            jwt,
            encryption_key: optional_var("ENCRYPTION_KEY"),
            encryption_key_salt: optional_var("ENCRYPTION_KEY_SALT"),
            ollama,
            gitlab_timeout_secs: parse_var("GITLAB_TIMEOUT_SECS", "10")?,
        })
    }

    pub fn gitlab_timeout(&self) -> Duration {
        Duration::from_secs(self.gitlab_timeout_secs)
    }
}

/// Read a variable, treating unset and blank values alike.
pub(crate) fn optional_var(var: &'static str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable, falling back to `default` when unset.
pub(crate) fn parse_var<T>(var: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let value = optional_var(var).unwrap_or_else(|| default.to_string());
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}
