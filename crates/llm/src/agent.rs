//! Bounded tool-invocation loop on top of [`TextCompletion`].
//!
//! The model is offered a set of tools. Each round, any requested tool calls
//! are executed and their results appended to the conversation. After
//! `max_rounds` rounds the model is asked once more with no tools offered so
//! it has to answer in prose.

use async_trait::async_trait;
use serde_json::Value;

use crate::client::TextCompletion;
use crate::completion::{Completion, Segment};
use crate::error::LlmError;
use crate::model::{ChatMessage, CompletionRequest, ToolCall, ToolCallFunction, ToolDefinition};

/// Default number of tool rounds before forcing a text answer.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 3;

/// Executes tool calls requested by the model.
///
/// Failures are reported as text so the model can explain them to the user.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, arguments: &Value) -> String;
}

/// Result of an agent run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// The final completion returned by the model.
    pub completion: Completion,
    /// Every tool invocation and its result, in execution order.
    pub transcript: Vec<Segment>,
    /// Tool rounds executed.
    pub rounds: usize,
}

impl AgentRun {
    /// Text of the final answer, ignoring tool segments.
    pub fn text(&self) -> Option<String> {
        self.completion.text()
    }

    /// Content of the most recent tool result, if any tool ran.
    pub fn last_tool_result(&self) -> Option<&str> {
        self.transcript.iter().rev().find_map(|segment| match segment {
            Segment::ToolResult { content, .. } => Some(content.as_str()),
            _ => None,
        })
    }
}

/// Drive `llm` until it answers without tool calls or `max_rounds` is spent.
pub async fn run_with_tools(
    llm: &dyn TextCompletion,
    mut messages: Vec<ChatMessage>,
    tools: &[ToolDefinition],
    executor: &dyn ToolExecutor,
    max_rounds: usize,
) -> Result<AgentRun, LlmError> {
    let mut transcript = Vec::new();
    let mut rounds = 0;

    loop {
        let offer_tools = rounds < max_rounds && !tools.is_empty();
        let request = CompletionRequest {
            messages: messages.clone(),
            tools: if offer_tools { tools.to_vec() } else { Vec::new() },
        };
        let completion = llm.complete(&request).await?;

        let calls: Vec<(String, Value)> = completion
            .tool_uses()
            .into_iter()
            .map(|(name, args)| (name.to_string(), args.clone()))
            .collect();

        if calls.is_empty() || !offer_tools {
            return Ok(AgentRun {
                completion,
                transcript,
                rounds,
            });
        }

        rounds += 1;
        tracing::debug!(round = rounds, calls = calls.len(), "Executing tool calls");

        messages.push(ChatMessage {
            tool_calls: calls
                .iter()
                .map(|(name, arguments)| ToolCall {
                    function: ToolCallFunction {
                        name: name.clone(),
                        arguments: arguments.clone(),
                    },
                })
                .collect(),
            ..ChatMessage::assistant(completion.text().unwrap_or_default())
        });

        for (name, arguments) in calls {
            let output = executor.execute(&name, &arguments).await;
            messages.push(ChatMessage::tool(output.clone()));
            transcript.push(Segment::ToolUse {
                name: name.clone(),
                arguments,
            });
            transcript.push(Segment::ToolResult {
                name,
                content: output,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    /// Replays canned completions and records requests.
    struct Scripted {
        replies: Mutex<Vec<Completion>>,
        tool_counts: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Completion>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                tool_counts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextCompletion for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
            self.tool_counts.lock().unwrap().push(request.tools.len());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| LlmError::InvalidResponse("script exhausted".into()))
        }
    }

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ToolExecutor for Echo {
        async fn execute(&self, name: &str, arguments: &Value) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            format!("{name} -> {arguments}")
        }
    }

    fn tool_call(name: &str) -> Completion {
        Completion::Segments(vec![Segment::ToolUse {
            name: name.into(),
            arguments: json!({"state": "opened"}),
        }])
    }

    fn tools() -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "list_merge_requests".into(),
            description: "List".into(),
            parameters: json!({"type": "object"}),
        }]
    }

    #[tokio::test]
    async fn plain_answer_needs_no_tools() {
        let llm = Scripted::new(vec![Completion::PlainText("hi".into())]);
        let echo = Echo { calls: AtomicUsize::new(0) };

        let run = run_with_tools(&llm, vec![ChatMessage::user("hello")], &tools(), &echo, 3)
            .await
            .unwrap();

        assert_eq!(run.text().as_deref(), Some("hi"));
        assert_eq!(run.rounds, 0);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tool_results_feed_the_final_answer() {
        let llm = Scripted::new(vec![
            tool_call("list_merge_requests"),
            Completion::PlainText("There is one open MR.".into()),
        ]);
        let echo = Echo { calls: AtomicUsize::new(0) };

        let run = run_with_tools(&llm, vec![ChatMessage::user("list mrs")], &tools(), &echo, 3)
            .await
            .unwrap();

        assert_eq!(run.rounds, 1);
        assert_eq!(run.text().as_deref(), Some("There is one open MR."));
        assert!(run.last_tool_result().unwrap().starts_with("list_merge_requests"));
    }

    #[tokio::test]
    async fn rounds_are_bounded_and_final_call_offers_no_tools() {
        let llm = Scripted::new(vec![
            tool_call("list_merge_requests"),
            tool_call("list_merge_requests"),
            tool_call("list_merge_requests"),
        ]);
        let echo = Echo { calls: AtomicUsize::new(0) };

        let run = run_with_tools(&llm, vec![ChatMessage::user("loop")], &tools(), &echo, 2)
            .await
            .unwrap();

        assert_eq!(run.rounds, 2);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*llm.tool_counts.lock().unwrap(), vec![1, 1, 0]);
        assert_eq!(run.text(), None);
    }
}
