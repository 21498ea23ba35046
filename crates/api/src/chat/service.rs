//! One chat turn: persist, dispatch or converse, persist the reply.
//!
//! Routing order for a message:
//!
//! 1. Slash commands go to the dispatcher.
//! 2. A bare configuration id answers a pending selection prompt and re-runs
//!    the command that asked for it.
//! 3. A bare number answers a `/review-mr` invitation.
//! 4. Recognised GitLab intents go to the dispatcher.
//! 5. Everything else goes to the language model, with GitLab tools when a
//!    configuration is selected.
//!
//! The conversation's selected configuration is remembered only in the
//! metadata of assistant messages, never in process state.

use chrono::Utc;
use mergedesk_core::error::CoreError;
use mergedesk_core::intent::{parse_slash_command, Intent, SlashCommand};
use mergedesk_core::types::{DbId, Timestamp};
use mergedesk_db::models::chat::{
    session_title_from, ChatMessage, ChatSession, CreateChatMessage, MessageRole,
};
use mergedesk_db::models::gitlab_config::GitLabConfig;
use mergedesk_db::repositories::{ChatMessageRepo, ChatSessionRepo, GitLabConfigRepo};
use mergedesk_gitlab::GitLabTarget;
use mergedesk_llm::{
    run_with_tools, ChatMessage as LlmMessage, CompletionRequest, DEFAULT_MAX_TOOL_ROUNDS,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::dispatcher::{resolve_selection, CommandDispatcher, DispatchReply, Selection};
use crate::chat::tools::{tool_definitions, GitLabToolExecutor};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Prior messages sent to the model as context.
pub const HISTORY_LIMIT: i64 = 20;

/// Returned when the model produced neither text nor a tool result.
pub const EMPTY_REPLY: &str = "Sorry, I couldn't come up with a response. Please try rephrasing.";

const SYSTEM_PROMPT: &str = "You are MergeDesk, a helpful assistant for GitLab merge requests. \
When GitLab tools are available, use them to look up merge requests instead of guessing. \
When reviewing a merge request, summarise the change, point out risky or unclear code, and \
suggest concrete improvements. Keep answers concise and use markdown.";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Continue an existing session; a new one is created when absent.
    pub session_id: Option<DbId>,
    /// Explicitly selected GitLab configuration.
    pub config_id: Option<DbId>,
}

/// Response body for `POST /chat`.
#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub model: String,
    pub timestamp: Timestamp,
    pub session_id: DbId,
    /// Configuration used for this turn; pass it back to keep using it.
    pub selected_config_id: Option<DbId>,
}

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum ReplySource {
    Command,
    Dispatcher,
    Llm,
}

/// Metadata stored on assistant messages.
#[derive(Debug, Serialize)]
struct ReplyMetadata {
    source: ReplySource,
    config_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    intent: Option<Intent>,
    /// Command waiting for a configuration to be picked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pending_command: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    awaiting_mr_number: bool,
}

/// What the previous assistant message left behind for this turn.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConversationContext {
    config_id: Option<DbId>,
    pending_command: Option<String>,
    awaiting_mr_number: bool,
}

impl ConversationContext {
    fn from_history(history: &[ChatMessage]) -> Self {
        history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant.as_str())
            .and_then(|m| m.message_metadata.clone())
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }
}

/// The reply of one turn before it is persisted.
struct Turn {
    text: String,
    metadata: ReplyMetadata,
}

impl Turn {
    fn from_dispatch(reply: DispatchReply, source: ReplySource) -> Self {
        Self {
            text: reply.text,
            metadata: ReplyMetadata {
                source,
                config_id: reply.config_id,
                intent: reply.intent,
                pending_command: None,
                awaiting_mr_number: false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct ChatService<'a> {
    state: &'a AppState,
}

impl<'a> ChatService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Handle one user message and return the assistant's reply.
    pub async fn send(&self, user_id: DbId, request: ChatRequest) -> AppResult<ChatReply> {
        let text = request.message.trim();
        if text.is_empty() {
            return Err(CoreError::Validation("message must not be empty".into()).into());
        }

        let session = self.open_session(user_id, request.session_id, text).await?;
        let history =
            ChatMessageRepo::list_recent(&self.state.pool, session.id, HISTORY_LIMIT).await?;
        let context = ConversationContext::from_history(&history);

        ChatMessageRepo::create(
            &self.state.pool,
            &CreateChatMessage {
                session_id: session.id,
                role: MessageRole::User,
                content: text.to_string(),
                message_metadata: request
                    .config_id
                    .map(|id| serde_json::json!({ "config_id": id })),
            },
        )
        .await?;

        let configs = GitLabConfigRepo::list_for_user(&self.state.pool, user_id).await?;
        let turn = self
            .respond(text, request.config_id, &context, &configs, &history)
            .await?;

        let metadata = serde_json::to_value(&turn.metadata)
            .map_err(|e| AppError::InternalError(format!("Failed to encode metadata: {e}")))?;
        ChatMessageRepo::create(
            &self.state.pool,
            &CreateChatMessage {
                session_id: session.id,
                role: MessageRole::Assistant,
                content: turn.text.clone(),
                message_metadata: Some(metadata),
            },
        )
        .await?;
        ChatSessionRepo::touch(&self.state.pool, session.id).await?;

        tracing::info!(
            user_id = %user_id,
            session_id = %session.id,
            source = ?turn.metadata.source,
            config_id = ?turn.metadata.config_id,
            "Chat turn completed",
        );

        Ok(ChatReply {
            response: turn.text,
            model: self.state.llm.model_name().to_string(),
            timestamp: Utc::now(),
            session_id: session.id,
            selected_config_id: turn.metadata.config_id,
        })
    }

    async fn open_session(
        &self,
        user_id: DbId,
        session_id: Option<DbId>,
        text: &str,
    ) -> AppResult<ChatSession> {
        match session_id {
            Some(id) => ChatSessionRepo::find_by_id(&self.state.pool, user_id, id)
                .await?
                .ok_or(AppError::Core(CoreError::NotFound {
                    entity: "Chat session",
                    id,
                })),
            None => {
                let title = session_title_from(text);
                let session =
                    ChatSessionRepo::create(&self.state.pool, user_id, title.as_deref()).await?;
                tracing::debug!(user_id = %user_id, session_id = %session.id, "Chat session created");
                Ok(session)
            }
        }
    }

    async fn respond(
        &self,
        text: &str,
        explicit: Option<DbId>,
        context: &ConversationContext,
        configs: &[GitLabConfig],
        history: &[ChatMessage],
    ) -> AppResult<Turn> {
        let dispatcher = CommandDispatcher::new(
            &self.state.gitlab,
            &self.state.cipher,
            self.state.llm.as_ref(),
            configs,
        );

        if let Some(command) = parse_slash_command(text) {
            // A remembered id whose configuration is gone falls back to selection.
            let remembered = context
                .config_id
                .filter(|id| configs.iter().any(|c| c.id == *id));
            return self
                .run_command(&dispatcher, &command, explicit.or(remembered))
                .await;
        }

        if let Some(picked) = picked_config(text, configs) {
            let command = context
                .pending_command
                .as_deref()
                .and_then(parse_slash_command)
                .unwrap_or(SlashCommand::ShowMergeRequests);
            return self.run_command(&dispatcher, &command, Some(picked)).await;
        }

        if context.awaiting_mr_number {
            if let (Some(iid), Some(config)) = (
                bare_mr_number(text),
                context
                    .config_id
                    .and_then(|id| configs.iter().find(|c| c.id == id)),
            ) {
                let intent = Intent::MergeRequestDetails { iid };
                let details = dispatcher.run_intent(config, intent).await?;
                let text = self
                    .review(&details, history, text)
                    .await
                    .unwrap_or(details);
                return Ok(Turn {
                    text,
                    metadata: ReplyMetadata {
                        source: ReplySource::Dispatcher,
                        config_id: Some(config.id),
                        intent: Some(intent),
                        pending_command: None,
                        awaiting_mr_number: false,
                    },
                });
            }
        }

        if let Some(reply) = dispatcher
            .handle_query(text, explicit, context.config_id)
            .await?
        {
            return Ok(Turn::from_dispatch(reply, ReplySource::Dispatcher));
        }

        self.converse(text, explicit, context.config_id, configs, history)
            .await
    }

    async fn run_command(
        &self,
        dispatcher: &CommandDispatcher<'_>,
        command: &SlashCommand,
        config_id: Option<DbId>,
    ) -> AppResult<Turn> {
        let reply = dispatcher.handle_slash_command(command, config_id).await?;
        let selected = reply.config_id.is_some();
        let mut turn = Turn::from_dispatch(reply, ReplySource::Command);

        match command {
            SlashCommand::ShowMergeRequests if !selected => {
                turn.metadata.pending_command = Some(SlashCommand::SHOW_MR);
            }
            SlashCommand::ReviewMergeRequest if !selected => {
                turn.metadata.pending_command = Some(SlashCommand::REVIEW_MR);
            }
            SlashCommand::ReviewMergeRequest => turn.metadata.awaiting_mr_number = true,
            _ => {}
        }
        Ok(turn)
    }

    /// Ask the model to review fetched merge request details. `None` when
    /// the model is unavailable, in which case the raw details are shown.
    async fn review(&self, details: &str, history: &[ChatMessage], text: &str) -> Option<String> {
        if mergedesk_gitlab::format::is_error_output(details) {
            return None;
        }

        let mut messages = context_messages(history);
        messages.push(LlmMessage::user(format!(
            "{text}\n\nReview this merge request:\n\n{details}"
        )));
        let request = CompletionRequest {
            messages,
            tools: Vec::new(),
        };

        match self.state.llm.complete(&request).await {
            Ok(completion) => completion
                .text()
                .map(|review| format!("{details}\n\n---\n\n{review}")),
            Err(err) => {
                tracing::warn!(error = %err, "LLM review failed, returning merge request details");
                None
            }
        }
    }

    /// General conversation with the model.
    async fn converse(
        &self,
        text: &str,
        explicit: Option<DbId>,
        remembered: Option<DbId>,
        configs: &[GitLabConfig],
        history: &[ChatMessage],
    ) -> AppResult<Turn> {
        let mut messages = context_messages(history);
        messages.push(LlmMessage::user(text));

        let selected = match resolve_selection(configs, explicit, remembered) {
            Ok(Selection::ConfigSelected(id)) => configs.iter().find(|c| c.id == id),
            Ok(Selection::NoConfigSelected) => None,
            Err(unknown) => {
                tracing::warn!(config_id = %unknown.0, "Ignoring unknown configuration id");
                None
            }
        };

        let (reply, config_id) = match selected {
            Some(config) => {
                let token = self
                    .state
                    .cipher
                    .decrypt(&config.access_token_encrypted)
                    .map_err(CoreError::from)?;
                let executor = GitLabToolExecutor::new(
                    &self.state.gitlab,
                    GitLabTarget {
                        base_url: &config.gitlab_url,
                        token: &token,
                        project_id: config.project_id.as_deref(),
                    },
                );
                let run = run_with_tools(
                    self.state.llm.as_ref(),
                    messages,
                    &tool_definitions(),
                    &executor,
                    DEFAULT_MAX_TOOL_ROUNDS,
                )
                .await?;
                tracing::debug!(rounds = run.rounds, "Agent run finished");
                let reply = run
                    .text()
                    .or_else(|| run.last_tool_result().map(str::to_string));
                (reply, Some(config.id))
            }
            None => {
                let completion = self
                    .state
                    .llm
                    .complete(&CompletionRequest {
                        messages,
                        tools: Vec::new(),
                    })
                    .await?;
                (completion.text(), None)
            }
        };

        Ok(Turn {
            text: reply.unwrap_or_else(|| EMPTY_REPLY.to_string()),
            metadata: ReplyMetadata {
                source: ReplySource::Llm,
                config_id,
                intent: None,
                pending_command: None,
                awaiting_mr_number: false,
            },
        })
    }
}

/// System prompt plus prior user and assistant messages.
fn context_messages(history: &[ChatMessage]) -> Vec<LlmMessage> {
    std::iter::once(LlmMessage::system(SYSTEM_PROMPT))
        .chain(history.iter().filter_map(|m| {
            if m.role == MessageRole::User.as_str() {
                Some(LlmMessage::user(m.content.clone()))
            } else if m.role == MessageRole::Assistant.as_str() {
                Some(LlmMessage::assistant(m.content.clone()))
            } else {
                None
            }
        }))
        .collect()
}

/// A message consisting only of one of the user's configuration ids.
fn picked_config(text: &str, configs: &[GitLabConfig]) -> Option<DbId> {
    let id: Uuid = text.trim().trim_matches('`').parse().ok()?;
    configs.iter().any(|c| c.id == id).then_some(id)
}

/// A message consisting only of a merge request number (`123`, `#123`, `!123`).
fn bare_mr_number(text: &str) -> Option<u64> {
    text.trim()
        .trim_start_matches(['!', '#'])
        .parse()
        .ok()
        .filter(|n| *n > 0)
}
