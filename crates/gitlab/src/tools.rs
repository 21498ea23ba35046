//! Merge request operations exposed to chat, returning display text.
//!
//! These never return `Err`: failures become text prefixed with
//! [`ERROR_MARKER`](crate::format::ERROR_MARKER).

use mergedesk_core::intent::MergeRequestState;

use crate::api::{GitLabApi, GitLabApiError};
use crate::format::{error_text, render_merge_request_details, render_merge_request_list};

/// Message returned when the selected credential has no project configured.
pub const NO_PROJECT_MESSAGE: &str =
    "No project ID configured. Please set a project ID in your GitLab configuration.";

/// A resolved credential: instance URL, decrypted token and target project.
#[derive(Clone, Copy)]
pub struct GitLabTarget<'a> {
    pub base_url: &'a str,
    pub token: &'a str,
    pub project_id: Option<&'a str>,
}

impl std::fmt::Debug for GitLabTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabTarget")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl<'a> GitLabTarget<'a> {
    fn project(&self) -> Option<&'a str> {
        self.project_id.map(str::trim).filter(|p| !p.is_empty())
    }
}

/// List merge requests of the target project as markdown.
pub async fn list_merge_requests(
    api: &GitLabApi,
    target: &GitLabTarget<'_>,
    state: MergeRequestState,
) -> String {
    let Some(project) = target.project() else {
        return error_text(NO_PROJECT_MESSAGE);
    };

    match api
        .list_merge_requests(target.base_url, target.token, project, state)
        .await
    {
        Ok(mrs) => {
            tracing::debug!(project, state = %state, count = mrs.len(), "Fetched merge requests");
            render_merge_request_list(project, state, &mrs)
        }
        Err(err) => failure_text(&err, "Error fetching merge requests"),
    }
}

/// Describe one merge request, including a truncated diff, as markdown.
pub async fn get_merge_request_details(
    api: &GitLabApi,
    target: &GitLabTarget<'_>,
    iid: u64,
) -> String {
    let Some(project) = target.project() else {
        return error_text(NO_PROJECT_MESSAGE);
    };

    let fetched = async {
        let mr = api
            .get_merge_request(target.base_url, target.token, project, iid)
            .await?;
        let changes = api
            .get_merge_request_changes(target.base_url, target.token, project, iid)
            .await?;
        Ok::<_, GitLabApiError>((mr, changes))
    }
    .await;

    match fetched {
        Ok((mr, changes)) => render_merge_request_details(&mr, &changes),
        Err(err) => failure_text(&err, "Error fetching merge request details"),
    }
}

fn failure_text(err: &GitLabApiError, context: &str) -> String {
    tracing::warn!(error = %err, "{context}");
    match err {
        GitLabApiError::ApiError { status, body } => {
            error_text(format!("GitLab API Error: {status} - {body}"))
        }
        GitLabApiError::Request(e) if e.is_timeout() => {
            error_text(format!("{context}: request to GitLab timed out"))
        }
        other => error_text(format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::format::is_error_output;

    fn mr_json(iid: u64) -> serde_json::Value {
        json!({
            "iid": iid,
            "title": format!("MR {iid}"),
            "description": "Adds things",
            "state": "opened",
            "author": {"name": "Ada Lovelace", "username": "ada"},
            "source_branch": "feature",
            "target_branch": "main",
            "labels": ["backend"],
            "upvotes": 0,
            "downvotes": 0,
            "created_at": "2026-03-01T10:00:00.000Z",
            "updated_at": "2026-03-02T10:00:00.000Z",
            "web_url": format!("https://gitlab.example.com/g/p/-/merge_requests/{iid}")
        })
    }

    fn api() -> GitLabApi {
        GitLabApi::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn lists_with_state_and_page_size() {
        let server = MockServer::start().await;
        let body: Vec<_> = (1..=12).map(mr_json).collect();
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/merge_requests"))
            .and(query_param("state", "closed"))
            .and(query_param("per_page", "100"))
            .and(header("PRIVATE-TOKEN", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let target = GitLabTarget {
            base_url: &uri,
            token: "tok",
            project_id: Some("42"),
        };
        let out = list_merge_requests(&api(), &target, MergeRequestState::Closed).await;

        assert!(!is_error_output(&out));
        assert_eq!(out.matches("### MR !").count(), 10);
        assert!(out.contains("2 more merge requests"));
    }

    #[tokio::test]
    async fn project_paths_are_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/group%2Fapp/merge_requests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let target = GitLabTarget {
            base_url: &uri,
            token: "tok",
            project_id: Some("group/app"),
        };
        let out = list_merge_requests(&api(), &target, MergeRequestState::Opened).await;
        assert_eq!(out, "No opened merge requests found in project group/app.");
    }

    #[tokio::test]
    async fn missing_project_short_circuits() {
        let target = GitLabTarget {
            base_url: "https://gitlab.example.com",
            token: "tok",
            project_id: None,
        };
        let out = list_merge_requests(&api(), &target, MergeRequestState::Opened).await;
        assert!(is_error_output(&out));
        assert!(out.contains("No project ID configured"));
    }

    #[tokio::test]
    async fn api_errors_become_marked_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/merge_requests"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let uri = server.uri();
        let target = GitLabTarget {
            base_url: &uri,
            token: "tok",
            project_id: Some("42"),
        };
        let out = list_merge_requests(&api(), &target, MergeRequestState::Opened).await;
        assert_eq!(out, "❌ GitLab API Error: 403 - forbidden");
    }

    #[tokio::test]
    async fn details_fetch_mr_and_changes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/merge_requests/456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mr_json(456)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/merge_requests/456/changes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "changes": [{"new_path": "src/lib.rs", "diff": "@@ -1 +1 @@\n-old\n+new"}]
            })))
            .mount(&server)
            .await;

        let uri = server.uri();
        let target = GitLabTarget {
            base_url: &uri,
            token: "tok",
            project_id: Some("42"),
        };
        let out = get_merge_request_details(&api(), &target, 456).await;

        assert!(out.starts_with("**Merge Request !456: MR 456**"));
        assert!(out.contains("1 file(s) changed"));
        assert!(out.contains("```diff\n@@ -1 +1 @@\n-old\n+new\n```"));
        assert!(out.contains("Adds things"));
    }

    #[tokio::test]
    async fn details_not_found_is_marked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/merge_requests/9"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{\"message\":\"404 Not found\"}"))
            .mount(&server)
            .await;

        let uri = server.uri();
        let target = GitLabTarget {
            base_url: &uri,
            token: "tok",
            project_id: Some("42"),
        };
        let out = get_merge_request_details(&api(), &target, 9).await;
        assert!(out.starts_with("❌ GitLab API Error: 404"));
    }

    #[test]
    fn debug_redacts_token() {
        let target = GitLabTarget {
            base_url: "https://gitlab.example.com",
            token: "glpat-secret",
            project_id: Some("1"),
        };
        assert!(!format!("{target:?}").contains("glpat-secret"));
    }
}
