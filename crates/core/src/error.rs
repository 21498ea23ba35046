use crate::token_cipher::CipherError;
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// GitLab (or another upstream API) answered with a non-success status.
    #[error("Upstream error ({code}): {message}")]
    Upstream { code: String, message: String },

    /// Timeout or connection failure talking to an upstream service.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A stored secret could not be decrypted with the active key.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CipherError> for CoreError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::Encrypt | CipherError::InvalidSalt(_) => {
                CoreError::Internal(err.to_string())
            }
            CipherError::Malformed(_) | CipherError::Decryption => {
                CoreError::Decryption(err.to_string())
            }
        }
    }
}
