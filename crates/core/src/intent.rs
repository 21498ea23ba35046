//! Chat intent recognition for GitLab commands.
//!
//! Free text is matched with lightweight, case-insensitive patterns:
//!
//! - An explicit merge-request reference (`!123`, `mr 123`, `merge request 123`)
//!   resolves to [`Intent::MergeRequestDetails`].
//! - Otherwise a list-oriented keyword (`list`, `show`, `mr`, `merge request`,
//!   `pull request`) resolves to [`Intent::ListMergeRequests`], with the state
//!   filter picked from `closed`, `merged`, `all` in that priority order.
//! - Anything else is not a GitLab intent and yields `None`, so the caller can
//!   hand the text to the general chat agent.
//!
//! Slash commands (`/show-mr`, `/review-mr`) bypass free-text parsing and are
//! recognised by [`parse_slash_command`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

static MR_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:!|\bmr|\bmerge\s+request)\s*#?(\d+)").expect("valid regex")
});

static LIST_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:list|show|mrs?|merge\s+requests?|pull\s+requests?)\b")
        .expect("valid regex")
});

static CLOSED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bclosed\b").expect("valid regex"));
static MERGED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bmerged\b").expect("valid regex"));
static ALL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\ball\b").expect("valid regex"));

// ---------------------------------------------------------------------------
// Merge request state filter
// ---------------------------------------------------------------------------

/// State filter accepted by the GitLab merge request list endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeRequestState {
    #[default]
    Opened,
    Closed,
    Merged,
    All,
}

impl MergeRequestState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Closed => "closed",
            Self::Merged => "merged",
            Self::All => "all",
        }
    }
}

impl fmt::Display for MergeRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeRequestState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opened" | "open" => Ok(Self::Opened),
            "closed" => Ok(Self::Closed),
            "merged" => Ok(Self::Merged),
            "all" => Ok(Self::All),
            other => Err(CoreError::Validation(format!(
                "Invalid merge request state '{other}'. Must be one of: opened, closed, merged, all"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

/// A GitLab action resolved from chat text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    ListMergeRequests { state: MergeRequestState },
    MergeRequestDetails { iid: u64 },
}

/// Resolve free text to a GitLab intent, or `None` when it is not one.
pub fn parse_intent(text: &str) -> Option<Intent> {
    if let Some(iid) = MR_NUMBER_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
    {
        return Some(Intent::MergeRequestDetails { iid });
    }

    if LIST_KEYWORD_RE.is_match(text) {
        return Some(Intent::ListMergeRequests {
            state: state_from_text(text),
        });
    }

    None
}

/// Pick the state filter mentioned in `text`, defaulting to opened.
pub fn state_from_text(text: &str) -> MergeRequestState {
    if CLOSED_RE.is_match(text) {
        MergeRequestState::Closed
    } else if MERGED_RE.is_match(text) {
        MergeRequestState::Merged
    } else if ALL_RE.is_match(text) {
        MergeRequestState::All
    } else {
        MergeRequestState::Opened
    }
}

// ---------------------------------------------------------------------------
// Slash commands
// ---------------------------------------------------------------------------

/// Explicit chat commands that skip free-text parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    /// `/show-mr` -- list open merge requests.
    ShowMergeRequests,
    /// `/review-mr` -- list open merge requests and invite a follow-up number.
    ReviewMergeRequest,
    /// Any other `/word`.
    Unknown(String),
}

impl SlashCommand {
    pub const SHOW_MR: &'static str = "/show-mr";
    pub const REVIEW_MR: &'static str = "/review-mr";
}

/// Parse a message that starts with `/`. Returns `None` for ordinary text.
pub fn parse_slash_command(text: &str) -> Option<SlashCommand> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('/') {
        return None;
    }
    let command = trimmed.split_whitespace().next().unwrap_or(trimmed);
    let command = command.to_ascii_lowercase();
    Some(match command.as_str() {
        SlashCommand::SHOW_MR => SlashCommand::ShowMergeRequests,
        SlashCommand::REVIEW_MR => SlashCommand::ReviewMergeRequest,
        _ => SlashCommand::Unknown(command),
    })
}
