//! Maps chat text and slash commands to GitLab operations.
//!
//! The dispatcher never holds a process-wide "current configuration": the
//! caller passes the user's configurations plus any explicit or remembered
//! selection on every call, and gets the chosen configuration id back with
//! the reply.

use mergedesk_core::error::CoreError;
use mergedesk_core::intent::{parse_intent, Intent, MergeRequestState, SlashCommand};
use mergedesk_core::token_cipher::TokenCipher;
use mergedesk_core::types::DbId;
use mergedesk_db::models::gitlab_config::GitLabConfig;
use mergedesk_gitlab::format::error_text;
use mergedesk_gitlab::{tools, GitLabApi, GitLabTarget};
use mergedesk_llm::{ChatMessage, CompletionRequest, TextCompletion};

/// Shown when the user has no stored configurations at all.
pub const NO_CONFIGS_MESSAGE: &str = "No GitLab configurations found. Please add a GitLab configuration in settings first.";

/// Appended to the merge request list for `/review-mr`.
pub const REVIEW_NEXT_STEP: &str =
    "💡 **Next step:** Reply with the MR number (e.g., `!123` or just `123`) to review it.";

// ---------------------------------------------------------------------------
// Selection state machine
// ---------------------------------------------------------------------------

/// Which configuration a conversation is operating on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    NoConfigSelected,
    ConfigSelected(DbId),
}

/// An explicit configuration id that is not among the user's configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownConfig(pub DbId);

/// Resolve the selection for one request.
///
/// In order: an explicit id (must resolve), a remembered id (ignored if it
/// no longer resolves), then the single active configuration. Several active
/// configurations with nothing chosen stay unselected.
pub fn resolve_selection(
    configs: &[GitLabConfig],
    explicit: Option<DbId>,
    remembered: Option<DbId>,
) -> Result<Selection, UnknownConfig> {
    if let Some(id) = explicit {
        return configs
            .iter()
            .any(|c| c.id == id)
            .then_some(Selection::ConfigSelected(id))
            .ok_or(UnknownConfig(id));
    }

    if let Some(id) = remembered.filter(|id| configs.iter().any(|c| c.id == *id)) {
        return Ok(Selection::ConfigSelected(id));
    }

    let mut active = configs.iter().filter(|c| c.is_active);
    match (active.next(), active.next()) {
        (Some(only), None) => Ok(Selection::ConfigSelected(only.id)),
        _ => Ok(Selection::NoConfigSelected),
    }
}

/// Numbered list of configurations used in selection prompts.
pub fn render_config_list(configs: &[GitLabConfig]) -> String {
    if configs.is_empty() {
        return NO_CONFIGS_MESSAGE.to_string();
    }

    configs
        .iter()
        .enumerate()
        .map(|(idx, config)| {
            let position = idx + 1;
            let status = if config.is_active { "✓ Valid" } else { "⚠ Invalid" };
            format!(
                "{position}. {name}\n   URL: {url}\n   Status: {status}\n   ID: {id}",
                name = config.display_name(position),
                url = config.gitlab_url,
                id = config.id,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Text produced by the dispatcher and the configuration it used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReply {
    pub text: String,
    pub config_id: Option<DbId>,
    pub intent: Option<Intent>,
}

impl DispatchReply {
    fn unselected(text: String) -> Self {
        Self {
            text,
            config_id: None,
            intent: None,
        }
    }
}

pub struct CommandDispatcher<'a> {
    gitlab: &'a GitLabApi,
    cipher: &'a TokenCipher,
    llm: &'a dyn TextCompletion,
    configs: &'a [GitLabConfig],
}

impl<'a> CommandDispatcher<'a> {
    pub fn new(
        gitlab: &'a GitLabApi,
        cipher: &'a TokenCipher,
        llm: &'a dyn TextCompletion,
        configs: &'a [GitLabConfig],
    ) -> Self {
        Self {
            gitlab,
            cipher,
            llm,
            configs,
        }
    }

    /// Handle `/show-mr`, `/review-mr` or an unknown slash command.
    ///
    /// Without `config_id` the user is asked to pick a configuration; with
    /// one, open merge requests of that configuration are listed.
    pub async fn handle_slash_command(
        &self,
        command: &SlashCommand,
        config_id: Option<DbId>,
    ) -> Result<DispatchReply, CoreError> {
        if let SlashCommand::Unknown(name) = command {
            return Ok(DispatchReply::unselected(format!(
                "❌ Unknown command: `{name}`\n\nAvailable commands:\n\
                 - `{}` - Show merge requests\n\
                 - `{}` - Review a merge request",
                SlashCommand::SHOW_MR,
                SlashCommand::REVIEW_MR,
            )));
        }

        if self.configs.is_empty() {
            return Ok(DispatchReply::unselected(format!(
                "{} **No GitLab Configurations Found**\n\n{NO_CONFIGS_MESSAGE}",
                mergedesk_gitlab::format::ERROR_MARKER
            )));
        }

        let Some(id) = config_id else {
            return Ok(DispatchReply::unselected(self.selection_prompt(command).await));
        };

        let Some(config) = self.find(id) else {
            return Ok(DispatchReply::unselected(unknown_config_text(id)));
        };

        let intent = Intent::ListMergeRequests {
            state: MergeRequestState::Opened,
        };
        let mut text = self.run_intent(config, intent).await?;
        if *command == SlashCommand::ReviewMergeRequest {
            text.push_str("\n\n");
            text.push_str(REVIEW_NEXT_STEP);
        }

        Ok(DispatchReply {
            text,
            config_id: Some(id),
            intent: Some(intent),
        })
    }

    /// Handle free text. Returns `None` when the text is not a GitLab request.
    pub async fn handle_query(
        &self,
        text: &str,
        explicit: Option<DbId>,
        remembered: Option<DbId>,
    ) -> Result<Option<DispatchReply>, CoreError> {
        let Some(intent) = parse_intent(text) else {
            return Ok(None);
        };

        let selection = match resolve_selection(self.configs, explicit, remembered) {
            Ok(selection) => selection,
            Err(UnknownConfig(id)) => {
                return Ok(Some(DispatchReply::unselected(unknown_config_text(id))));
            }
        };

        let config = match selection {
            Selection::ConfigSelected(id) => self.find(id),
            Selection::NoConfigSelected => None,
        };
        let Some(config) = config else {
            let prompt = if self.configs.is_empty() {
                NO_CONFIGS_MESSAGE.to_string()
            } else {
                format!(
                    "Please select a GitLab configuration first:\n\n{}\n\n\
                     Then use `{}` or `{}` to get started.",
                    render_config_list(self.configs),
                    SlashCommand::SHOW_MR,
                    SlashCommand::REVIEW_MR,
                )
            };
            return Ok(Some(DispatchReply::unselected(prompt)));
        };

        tracing::debug!(config_id = %config.id, ?intent, "Dispatching GitLab intent");
        let text = self.run_intent(config, intent).await?;
        Ok(Some(DispatchReply {
            text,
            config_id: Some(config.id),
            intent: Some(intent),
        }))
    }

    /// Execute an intent against a configuration, returning display text.
    pub async fn run_intent(&self, config: &GitLabConfig, intent: Intent) -> Result<String, CoreError> {
        let token = self.cipher.decrypt(&config.access_token_encrypted)?;
        let target = GitLabTarget {
            base_url: &config.gitlab_url,
            token: &token,
            project_id: config.project_id.as_deref(),
        };

        Ok(match intent {
            Intent::ListMergeRequests { state } => {
                tools::list_merge_requests(self.gitlab, &target, state).await
            }
            Intent::MergeRequestDetails { iid } => {
                tools::get_merge_request_details(self.gitlab, &target, iid).await
            }
        })
    }

    fn find(&self, id: DbId) -> Option<&'a GitLabConfig> {
        self.configs.iter().find(|c| c.id == id)
    }

    /// Ask the user to choose a configuration, phrased by the LLM when it
    /// answers and by a fixed template otherwise.
    async fn selection_prompt(&self, command: &SlashCommand) -> String {
        let config_list = render_config_list(self.configs);
        let goal = match command {
            SlashCommand::ReviewMergeRequest => {
                "The user wants an AI-assisted code review of a merge request. Ask them to \
                 pick a configuration first and explain that you will then show the merge \
                 requests available for review."
            }
            _ => "The user wants to see their merge requests. Ask them to pick a configuration.",
        };

        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(
                    "You are a helpful GitLab assistant. Answer briefly and in plain language \
                     without technical jargon.",
                ),
                ChatMessage::user(format!(
                    "{goal}\n\nAvailable GitLab configurations:\n{config_list}\n\n\
                     Start with a short acknowledgment, show the configurations in a clean \
                     format, and ask the user to reply with the configuration ID to use."
                )),
            ],
            tools: Vec::new(),
        };

        match self.llm.complete(&request).await {
            Ok(completion) => {
                if let Some(text) = completion.text() {
                    return text;
                }
                tracing::warn!("LLM returned no text for selection prompt, using template");
            }
            Err(err) => {
                tracing::warn!(error = %err, "LLM unavailable for selection prompt, using template");
            }
        }
        fallback_selection_prompt(command, &config_list)
    }
}

fn unknown_config_text(id: DbId) -> String {
    error_text(format!("Error: GitLab configuration with ID `{id}` not found."))
}

fn fallback_selection_prompt(command: &SlashCommand, config_list: &str) -> String {
    let lead = match command {
        SlashCommand::ReviewMergeRequest => {
            "Happy to help review a merge request! First, which GitLab configuration should I use?"
        }
        _ => "Sure! Which GitLab configuration should I use to show your merge requests?",
    };
    let follow_up = match command {
        SlashCommand::ReviewMergeRequest => {
            "\n\nOnce you pick one, I'll list the merge requests available for review."
        }
        _ => "",
    };
    format!(
        "{lead}\n\n{config_list}\n\nReply with the configuration ID you want to use.{follow_up}"
    )
}
