//! Agent host data model: connections, agents, threads, messages, runs.
//!
//! Field names follow the assistants-style wire format so these types
//! deserialize straight from host responses.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolDefinition};

/// Metadata key holding the Databricks connection kind.
pub const CONNECTION_TYPE_KEY: &str = "azure_databricks_connection_type";
/// Metadata key holding the Genie space id.
pub const GENIE_SPACE_KEY: &str = "genie_space_id";

/// Role of a thread message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input.
    User,
    /// Agent response.
    Assistant,
    /// Tool output.
    Tool,
}

/// A named reference to an external data-service endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Connection {
    /// Connection name.
    pub name: String,
    /// Endpoint target (workspace URL).
    pub target: String,
    /// Typed metadata (connection kind, space id).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// An agent registered on the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Agent identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Model deployment backing the agent.
    #[serde(default)]
    pub model: String,
}

/// Definition used to create an agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentDefinition {
    /// Model deployment.
    pub model: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// System instructions.
    pub instructions: String,
    /// Callable tools.
    pub tools: Vec<ToolDefinition>,
}

/// A conversation thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thread {
    /// Thread identifier.
    pub id: String,
    /// Creation time (unix seconds).
    #[serde(default)]
    pub created_at: i64,
}

/// Text payload of a content block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// The text itself.
    pub value: String,
    /// Citations and file references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<serde_json::Value>,
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    /// A text block.
    Text(TextBlock),
    /// Any other block kind (images, file references).
    Other(serde_json::Value),
}

/// Wire shape of a text block: `{"type": "text", "text": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Always `"text"`.
    #[serde(rename = "type")]
    pub kind: TextKind,
    /// Text payload.
    pub text: TextContent,
}

/// Tag for [`TextBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    /// Text content.
    Text,
}

impl ContentBlock {
    /// Creates a text block.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(TextBlock {
            kind: TextKind::Text,
            text: TextContent {
                value: value.into(),
                annotations: Vec::new(),
            },
        })
    }
}

/// A message in a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// Message identifier.
    pub id: String,
    /// Owning thread.
    pub thread_id: String,
    /// Author role.
    pub role: Role,
    /// Ordered content blocks.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Run that produced the message (assistant messages only).
    #[serde(default)]
    pub run_id: Option<String>,
    /// Creation time (unix seconds).
    #[serde(default)]
    pub created_at: i64,
}

impl ThreadMessage {
    /// Primary text of the message.
    ///
    /// The first content block's text, or the JSON rendering of the whole
    /// content when that block is not text.
    #[must_use]
    pub fn primary_text(&self) -> String {
        match self.content.first() {
            Some(ContentBlock::Text(block)) => block.text.value.clone(),
            Some(ContentBlock::Other(_)) | None => {
                serde_json::to_string(&self.content).unwrap_or_default()
            }
        }
    }
}

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting to start.
    Queued,
    /// Executing.
    InProgress,
    /// Waiting for tool outputs.
    RequiresAction,
    /// Cancellation requested.
    Cancelling,
    /// Cancelled.
    Cancelled,
    /// Failed.
    Failed,
    /// Finished successfully.
    Completed,
    /// Timed out on the host.
    Expired,
    /// Ended early (token limits).
    Incomplete,
    /// Any status this client does not know.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether no further transitions will happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Failed | Self::Completed | Self::Expired | Self::Incomplete
        )
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Incomplete => "incomplete",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action the host needs before a run can continue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequiredAction {
    /// Submit outputs for the listed tool calls.
    SubmitToolOutputs {
        /// Pending calls.
        submit_tool_outputs: PendingToolCalls,
    },
}

impl RequiredAction {
    /// Tool calls awaiting outputs.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::SubmitToolOutputs {
                submit_tool_outputs,
            } => &submit_tool_outputs.tool_calls,
        }
    }
}

/// Tool calls awaiting outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingToolCalls {
    /// Calls in request order.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

/// Host-reported run failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunError {
    /// Error code.
    #[serde(default)]
    pub code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

/// One execution of an agent against a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Run identifier.
    pub id: String,
    /// Thread the run executes against.
    pub thread_id: String,
    /// Agent executing the run.
    #[serde(rename = "assistant_id")]
    pub agent_id: String,
    /// Current status.
    pub status: RunStatus,
    /// Pending action when status is `requires_action`.
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    /// Failure detail when status is `failed`.
    #[serde(default)]
    pub last_error: Option<RunError>,
    /// Creation time (unix seconds).
    #[serde(default)]
    pub created_at: i64,
}

/// Output for one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Call being answered.
    pub tool_call_id: String,
    /// JSON string result.
    pub output: String,
}

/// Picks the reply produced by `run` from a thread's messages.
///
/// Prefers assistant messages tagged with the run's id. Hosts that do not
/// tag messages fall back to assistant messages created at or after the
/// run. Among candidates the newest wins; on equal timestamps the later
/// position in `messages` wins.
#[must_use]
pub fn select_reply<'a>(messages: &'a [ThreadMessage], run: &Run) -> Option<&'a ThreadMessage> {
    let assistant = || messages.iter().filter(|m| m.role == Role::Assistant);

    let newest = |candidates: Vec<&'a ThreadMessage>| {
        candidates
            .into_iter()
            .enumerate()
            .max_by_key(|(idx, m)| (m.created_at, *idx))
            .map(|(_, m)| m)
    };

    let tagged: Vec<_> = assistant()
        .filter(|m| m.run_id.as_deref() == Some(run.id.as_str()))
        .collect();
    if !tagged.is_empty() {
        return newest(tagged);
    }

    let untagged_recent: Vec<_> = assistant()
        .filter(|m| m.run_id.is_none() && m.created_at >= run.created_at)
        .collect();
    newest(untagged_recent)
}
