//! GitLab tools offered to the chat model when a configuration is selected.

use async_trait::async_trait;
use mergedesk_core::intent::MergeRequestState;
use mergedesk_gitlab::format::error_text;
use mergedesk_gitlab::{tools, GitLabApi, GitLabTarget};
use mergedesk_llm::{ToolDefinition, ToolExecutor};
use serde_json::{json, Value};

pub const LIST_MERGE_REQUESTS: &str = "list_merge_requests";
pub const GET_MERGE_REQUEST_DETAILS: &str = "get_merge_request_details";

/// JSON-schema descriptions of the GitLab tools.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: LIST_MERGE_REQUESTS.into(),
            description: "List merge requests of the selected GitLab project.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "state": {
                        "type": "string",
                        "enum": ["opened", "closed", "merged", "all"],
                        "description": "Filter by merge request state. Defaults to opened."
                    }
                }
            }),
        },
        ToolDefinition {
            name: GET_MERGE_REQUEST_DETAILS.into(),
            description: "Get details and a truncated diff of one merge request, \
                          for example to review it."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "mr_number": {
                        "type": "integer",
                        "description": "The merge request number (iid), e.g. 123 for !123."
                    }
                },
                "required": ["mr_number"]
            }),
        },
    ]
}

/// Runs GitLab tool calls against one resolved configuration.
#[derive(Debug)]
pub struct GitLabToolExecutor<'a> {
    api: &'a GitLabApi,
    target: GitLabTarget<'a>,
}

impl<'a> GitLabToolExecutor<'a> {
    pub fn new(api: &'a GitLabApi, target: GitLabTarget<'a>) -> Self {
        Self { api, target }
    }
}

#[async_trait]
impl ToolExecutor for GitLabToolExecutor<'_> {
    async fn execute(&self, name: &str, arguments: &Value) -> String {
        tracing::debug!(tool = name, "Executing GitLab tool");
        match name {
            LIST_MERGE_REQUESTS => {
                let state = match arguments.get("state").and_then(Value::as_str) {
                    None => MergeRequestState::Opened,
                    Some(raw) => match raw.parse::<MergeRequestState>() {
                        Ok(state) => state,
                        Err(err) => return error_text(err.to_string()),
                    },
                };
                tools::list_merge_requests(self.api, &self.target, state).await
            }
            GET_MERGE_REQUEST_DETAILS => match mr_number(arguments) {
                Some(iid) => tools::get_merge_request_details(self.api, &self.target, iid).await,
                None => error_text("mr_number must be a positive integer"),
            },
            other => error_text(format!("Unknown tool: {other}")),
        }
    }
}

/// Models sometimes send numbers as strings (`"123"` or `"!123"`).
fn mr_number(arguments: &Value) -> Option<u64> {
    match arguments.get("mr_number")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().trim_start_matches('!').parse().ok(),
        _ => None,
    }
}
