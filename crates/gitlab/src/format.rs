//! Markdown rendering of merge request data for chat replies.

use std::fmt::Write as _;

use mergedesk_core::intent::MergeRequestState;

use crate::models::{MergeRequest, MergeRequestChanges};

/// Leading marker on every failure text so callers can tell errors apart.
pub const ERROR_MARKER: &str = "❌";

/// Merge requests shown in a list before truncating.
pub const MAX_LISTED_MERGE_REQUESTS: usize = 10;
/// Files shown in a detail view before truncating.
pub const MAX_LISTED_FILES: usize = 5;
/// Diff lines shown per file.
pub const MAX_DIFF_LINES: usize = 10;

/// Whether a rendered output is an error text.
pub fn is_error_output(text: &str) -> bool {
    text.trim_start().starts_with(ERROR_MARKER)
}

/// Prefix `message` with the error marker.
pub fn error_text(message: impl AsRef<str>) -> String {
    format!("{ERROR_MARKER} {}", message.as_ref())
}

/// Date portion (`YYYY-MM-DD`) of an ISO-8601 timestamp.
fn date_part(timestamp: &str) -> &str {
    timestamp.split('T').next().unwrap_or(timestamp)
}

/// Render a merge request list, capped at [`MAX_LISTED_MERGE_REQUESTS`].
pub fn render_merge_request_list(
    project: &str,
    state: MergeRequestState,
    merge_requests: &[MergeRequest],
) -> String {
    if merge_requests.is_empty() {
        return format!("No {state} merge requests found in project {project}.");
    }

    let entries: Vec<String> = merge_requests
        .iter()
        .take(MAX_LISTED_MERGE_REQUESTS)
        .map(render_list_entry)
        .collect();

    let mut out = format!("# 📋 Merge Requests in Project {project}\n\n");
    let _ = write!(
        out,
        "**Filter:** {state} | **Total:** {}\n\n---\n\n",
        merge_requests.len()
    );
    out.push_str(&entries.join("\n\n"));

    if merge_requests.len() > MAX_LISTED_MERGE_REQUESTS {
        let _ = write!(
            out,
            "\n\n---\n\n*... and {} more merge requests*",
            merge_requests.len() - MAX_LISTED_MERGE_REQUESTS
        );
    }
    out
}

fn render_list_entry(mr: &MergeRequest) -> String {
    let labels = if mr.labels.is_empty() {
        "None".to_string()
    } else {
        mr.labels
            .iter()
            .map(|l| format!("`{l}`"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut votes = Vec::new();
    if mr.upvotes > 0 {
        votes.push(format!("👍 {}", mr.upvotes));
    }
    if mr.downvotes > 0 {
        votes.push(format!("👎 {}", mr.downvotes));
    }
    let status = if votes.is_empty() {
        format!("`{}`", mr.state)
    } else {
        format!("`{}` {}", mr.state, votes.join(" "))
    };

    format!(
        "### MR !{iid}: {title}\n\n\
         - **Author:** {name} (@{username})\n\
         - **Status:** {status}\n\
         - **Branch:** `{source}` → `{target}`\n\
         - **Labels:** {labels}\n\
         - **Created:** {created} | **Updated:** {updated}\n\
         - **URL:** {url}",
        iid = mr.iid,
        title = mr.title,
        name = mr.author.name,
        username = mr.author.username,
        source = mr.source_branch,
        target = mr.target_branch,
        created = date_part(&mr.created_at),
        updated = date_part(&mr.updated_at),
        url = mr.web_url,
    )
}

/// Render a single merge request with a truncated view of its diffs.
pub fn render_merge_request_details(mr: &MergeRequest, changes: &MergeRequestChanges) -> String {
    let description = mr
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("No description provided");

    let mut out = format!(
        "**Merge Request !{iid}: {title}**\n\n\
         **Author:** {name} (@{username})\n\
         **Status:** {state}\n\
         **Created:** {created}\n\
         **Updated:** {updated}\n\
         **Source Branch:** {source}\n\
         **Target Branch:** {target}\n\n\
         **Description:**\n{description}\n\n\
         **Changes:**\n",
        iid = mr.iid,
        title = mr.title,
        name = mr.author.name,
        username = mr.author.username,
        state = mr.state,
        created = mr.created_at,
        updated = mr.updated_at,
        source = mr.source_branch,
        target = mr.target_branch,
    );

    let files = &changes.changes;
    if files.is_empty() {
        out.push_str("No changes found.\n");
    } else {
        let _ = write!(out, "\n{} file(s) changed:\n\n", files.len());
        for change in files.iter().take(MAX_LISTED_FILES) {
            let _ = writeln!(out, "- **{}**", change.new_path);
            if !change.diff.is_empty() {
                let excerpt: Vec<&str> = change.diff.lines().take(MAX_DIFF_LINES).collect();
                let _ = write!(out, "```diff\n{}\n```\n\n", excerpt.join("\n"));
            }
        }
        if files.len() > MAX_LISTED_FILES {
            let _ = writeln!(out, "... and {} more files", files.len() - MAX_LISTED_FILES);
        }
    }

    let _ = write!(out, "\n**URL:** {}", mr.web_url);
    out
}
