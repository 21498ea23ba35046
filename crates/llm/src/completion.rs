//! Model output as a tagged union, with text extraction per variant.
//!
//! A backend either answers with plain text or with a sequence of segments
//! mixing prose, tool invocations and tool results. Only the prose is shown
//! to users.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    ToolUse { name: String, arguments: Value },
    ToolResult { name: String, content: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Completion {
    PlainText(String),
    Segments(Vec<Segment>),
}

impl Completion {
    /// Human-readable text of the completion, or `None` when it has none.
    ///
    /// Tool invocations and tool results are skipped; multiple text segments
    /// are joined with newlines.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::PlainText(text) => non_blank(text).map(str::to_string),
            Self::Segments(segments) => {
                let parts: Vec<&str> = segments
                    .iter()
                    .filter_map(|segment| match segment {
                        Segment::Text { text } => non_blank(text),
                        Segment::ToolUse { .. } | Segment::ToolResult { .. } => None,
                    })
                    .collect();
                (!parts.is_empty()).then(|| parts.join("\n"))
            }
        }
    }

    /// Tool invocations requested by this completion, in order.
    pub fn tool_uses(&self) -> Vec<(&str, &Value)> {
        match self {
            Self::PlainText(_) => Vec::new(),
            Self::Segments(segments) => segments
                .iter()
                .filter_map(|segment| match segment {
                    Segment::ToolUse { name, arguments } => Some((name.as_str(), arguments)),
                    _ => None,
                })
                .collect(),
        }
    }
}

fn non_blank(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
