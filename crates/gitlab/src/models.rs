//! Subset of the GitLab REST v4 payloads the service reads.
//!
//! Unknown fields are ignored; optional ones default so older GitLab
//! versions that omit them still decode.

use serde::Deserialize;

/// `GET /api/v4/user`
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: String,
}

/// Author block embedded in merge request payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestAuthor {
    pub name: String,
    pub username: String,
}

/// A merge request as returned by the list and single-MR endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequest {
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    pub author: MergeRequestAuthor,
    pub source_branch: String,
    pub target_branch: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub upvotes: u32,
    #[serde(default)]
    pub downvotes: u32,
    /// ISO-8601 timestamps, kept verbatim for display.
    pub created_at: String,
    pub updated_at: String,
    pub web_url: String,
}

/// `GET /projects/{id}/merge_requests/{iid}/changes`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeRequestChanges {
    #[serde(default)]
    pub changes: Vec<FileChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileChange {
    pub new_path: String,
    #[serde(default)]
    pub diff: String,
}
