//! Language model access for MergeDesk.
//!
//! The model is treated as an opaque [`TextCompletion`] service. Replies are
//! modelled by [`Completion`], and [`agent::run_with_tools`] drives a bounded
//! tool-calling loop on top of any backend. [`ollama::OllamaClient`] is the
//! concrete backend.

pub mod agent;
pub mod client;
pub mod completion;
pub mod error;
pub mod model;
pub mod ollama;

pub use agent::{run_with_tools, AgentRun, ToolExecutor, DEFAULT_MAX_TOOL_ROUNDS};
pub use client::TextCompletion;
pub use completion::{Completion, Segment};
pub use error::LlmError;
pub use model::{ChatMessage, CompletionRequest, Role, ToolDefinition};
pub use ollama::{OllamaClient, OllamaConfig};
