//! Scripted in-memory agent host for unit tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::host::AgentHost;
use super::message::{
    AgentDefinition, AgentInfo, Connection, ContentBlock, Role, Run, RunStatus, Thread,
    ThreadMessage, ToolOutput,
};
use crate::error::AgentError;

#[derive(Default)]
struct State {
    connection: Option<Connection>,
    agent: Option<AgentInfo>,
    created_runs: VecDeque<Run>,
    polled_runs: VecDeque<Run>,
    submit_responses: VecDeque<Run>,
    messages: Vec<ThreadMessage>,
    clock: i64,
    threads_created: usize,
    agents_created: Vec<AgentDefinition>,
    submitted: Vec<Vec<ToolOutput>>,
    cancelled: Vec<String>,
    list_calls: usize,
}

/// Agent host whose responses are queued up front.
#[derive(Default)]
pub struct MockHost {
    state: Mutex<State>,
}

fn scripted(what: &str) -> AgentError {
    AgentError::ApiRequest {
        message: format!("no scripted {what}"),
        status: Some(404),
    }
}

impl MockHost {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_connection(&self, connection: Connection) {
        self.state().connection = Some(connection);
    }

    pub fn set_agent(&self, agent: AgentInfo) {
        self.state().agent = Some(agent);
    }

    /// Queues responses for `create_run`.
    pub fn push_created_runs(&self, runs: impl IntoIterator<Item = Run>) {
        self.state().created_runs.extend(runs);
    }

    /// Queues responses for `get_run`.
    pub fn push_runs(&self, runs: impl IntoIterator<Item = Run>) {
        self.state().polled_runs.extend(runs);
    }

    /// Queues responses for `submit_tool_outputs`.
    pub fn push_submit_responses(&self, runs: impl IntoIterator<Item = Run>) {
        self.state().submit_responses.extend(runs);
    }

    /// Appends an assistant message to a thread.
    pub fn push_assistant_message(&self, thread_id: &str, text: &str, run_id: Option<&str>) {
        let mut state = self.state();
        state.clock += 1;
        let created_at = state.clock;
        let id = format!("msg_{}", state.messages.len() + 1);
        state.messages.push(ThreadMessage {
            id,
            thread_id: thread_id.to_string(),
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
            run_id: run_id.map(String::from),
            created_at,
        });
    }

    pub fn threads_created(&self) -> usize {
        self.state().threads_created
    }

    pub fn agents_created(&self) -> Vec<AgentDefinition> {
        self.state().agents_created.clone()
    }

    pub fn user_messages(&self) -> Vec<String> {
        self.state()
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(ThreadMessage::primary_text)
            .collect()
    }

    pub fn submitted_outputs(&self) -> Vec<Vec<ToolOutput>> {
        self.state().submitted.clone()
    }

    pub fn cancelled_runs(&self) -> Vec<String> {
        self.state().cancelled.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    /// Current mock clock, for building runs that start "now".
    pub fn now(&self) -> i64 {
        self.state().clock
    }
}

/// Builds a run in the given status.
pub fn run(id: &str, thread_id: &str, status: RunStatus, created_at: i64) -> Run {
    Run {
        id: id.to_string(),
        thread_id: thread_id.to_string(),
        agent_id: "asst_1".to_string(),
        status,
        required_action: None,
        last_error: None,
        created_at,
    }
}

#[async_trait]
impl AgentHost for MockHost {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_connection(&self, _name: &str) -> Result<Connection, AgentError> {
        self.state().connection.clone().ok_or_else(|| scripted("connection"))
    }

    async fn get_agent(&self, agent_id: &str) -> Result<AgentInfo, AgentError> {
        self.state()
            .agent
            .clone()
            .filter(|a| a.id == agent_id)
            .ok_or_else(|| scripted("agent"))
    }

    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentInfo, AgentError> {
        let mut state = self.state();
        state.agents_created.push(definition.clone());
        Ok(AgentInfo {
            id: format!("asst_created_{}", state.agents_created.len()),
            name: Some(definition.name.clone()),
            model: definition.model.clone(),
        })
    }

    async fn create_thread(&self) -> Result<Thread, AgentError> {
        let mut state = self.state();
        state.threads_created += 1;
        Ok(Thread {
            id: format!("thread_{}", state.threads_created),
            created_at: state.clock,
        })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ThreadMessage, AgentError> {
        let mut state = self.state();
        state.clock += 1;
        let message = ThreadMessage {
            id: format!("msg_{}", state.messages.len() + 1),
            thread_id: thread_id.to_string(),
            role,
            content: vec![ContentBlock::text(content)],
            run_id: None,
            created_at: state.clock,
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn create_run(&self, _thread_id: &str, _agent_id: &str) -> Result<Run, AgentError> {
        self.state()
            .created_runs
            .pop_front()
            .ok_or_else(|| scripted("created run"))
    }

    async fn get_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run, AgentError> {
        self.state()
            .polled_runs
            .pop_front()
            .ok_or_else(|| scripted("polled run"))
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, AgentError> {
        let mut state = self.state();
        state.submitted.push(outputs.to_vec());
        state
            .submit_responses
            .pop_front()
            .ok_or_else(|| scripted("submit response"))
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        self.state().cancelled.push(run_id.to_string());
        Ok(run(run_id, thread_id, RunStatus::Cancelling, 0))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
        let mut state = self.state();
        state.list_calls += 1;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect())
    }
}
