//! Pluggable agent host trait.
//!
//! Implementations translate these calls into a concrete hosting service's
//! API. This keeps the orchestrator and run loop decoupled from transport.

use async_trait::async_trait;

use super::message::{
    AgentDefinition, AgentInfo, Connection, Role, Run, Thread, ThreadMessage, ToolOutput,
};
use crate::error::AgentError;

/// Trait for agent hosting backends.
#[async_trait]
pub trait AgentHost: Send + Sync {
    /// Host name (e.g., `"foundry"`).
    fn name(&self) -> &'static str;

    /// Resolves a named connection to its descriptor.
    async fn get_connection(&self, name: &str) -> Result<Connection, AgentError>;

    /// Fetches an existing agent.
    async fn get_agent(&self, agent_id: &str) -> Result<AgentInfo, AgentError>;

    /// Creates an agent.
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentInfo, AgentError>;

    /// Creates an empty thread.
    async fn create_thread(&self) -> Result<Thread, AgentError>;

    /// Appends a message to a thread.
    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ThreadMessage, AgentError>;

    /// Starts a run of `agent_id` against `thread_id`.
    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run, AgentError>;

    /// Fetches the current state of a run.
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError>;

    /// Submits outputs for the pending tool calls of a run.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, AgentError>;

    /// Requests cancellation of a run.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError>;

    /// Lists a thread's messages in chronological order.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError>;
}
