use async_trait::async_trait;

use crate::completion::Completion;
use crate::error::LlmError;
use crate::model::CompletionRequest;

/// An opaque text-completion service.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Model identifier reported to clients.
    fn model_name(&self) -> &str;

    /// Run one completion over the given conversation.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;

    /// Whether the service currently answers. Defaults to `true` for
    /// backends without a cheap liveness probe.
    async fn is_available(&self) -> bool {
        true
    }
}
