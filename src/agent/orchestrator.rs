//! Conversation orchestrator.
//!
//! Coordinates one question end to end: connect (once per session) →
//! thread → user message → run with tool calls → reply extraction.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::config::{AgentConfig, ConnectionPolicy, ThreadMode};
use super::executor::ToolExecutor;
use super::host::AgentHost;
use super::message::{AgentDefinition, AgentInfo, Role, RunStatus, select_reply};
use super::run_loop::drive_run;
use super::tool::ToolSet;
use crate::error::{AgentError, ConnectionError, Error, Result};
use crate::genie::{DataQueryBridge, DataService, DataServiceFactory, genie_space_id};
use crate::poll::Sleeper;

/// Description given to agents created from a model deployment.
const AGENT_DESCRIPTION: &str = "An agent that uses Databricks Genie to answer questions.";

/// Outcome of one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// The agent's reply text.
    Reply(String),
    /// The run ended in a non-completed terminal status.
    RunFailed {
        /// Terminal status.
        status: RunStatus,
        /// Host-reported failure message, if any.
        error: Option<String>,
    },
    /// The run completed without an assistant message.
    NoReply,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reply(text) => write!(f, "Agent: {text}"),
            Self::RunFailed {
                status,
                error: Some(error),
            } => write!(f, "Run failed with status: {status} ({error})"),
            Self::RunFailed { status, error: None } => {
                write!(f, "Run failed with status: {status}")
            }
            Self::NoReply => f.write_str("The agent completed the run without replying."),
        }
    }
}

/// Whether the Genie tool is live for this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenieStatus {
    /// The bridge has a working data service.
    Enabled,
    /// Setup failed; the bridge answers with the not-initialized error.
    Disabled {
        /// Why setup failed.
        reason: String,
    },
}

/// Summary of a successful connect step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReport {
    /// Agent identifier.
    pub agent_id: String,
    /// Agent display name (falls back to the id).
    pub agent_name: String,
    /// Genie tool status.
    pub genie: GenieStatus,
}

struct Connected {
    agent: AgentInfo,
    executor: ToolExecutor,
    thread_id: Option<String>,
}

/// Orchestrates questions against a hosted agent.
pub struct Orchestrator {
    host: Arc<dyn AgentHost>,
    data: Arc<dyn DataServiceFactory>,
    sleeper: Arc<dyn Sleeper>,
    config: AgentConfig,
    connected: Option<Connected>,
}

impl Orchestrator {
    /// Creates an orchestrator; nothing is contacted until the first connect.
    pub fn new(
        host: Arc<dyn AgentHost>,
        data: Arc<dyn DataServiceFactory>,
        sleeper: Arc<dyn Sleeper>,
        config: AgentConfig,
    ) -> Self {
        Self {
            host,
            data,
            sleeper,
            config,
            connected: None,
        }
    }

    /// Whether the connect step has completed.
    pub const fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    /// Connects if not already connected.
    ///
    /// Returns a report the first time the session connects and `None`
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] under [`ConnectionPolicy::Strict`] when
    /// the Genie connection cannot be used, and [`Error::Agent`] when the
    /// agent cannot be resolved.
    pub async fn ensure_connected(&mut self) -> Result<Option<ConnectReport>> {
        if self.connected.is_some() {
            return Ok(None);
        }

        let (bridge, genie) = match self.setup_genie().await {
            Ok(service) => {
                info!(connection = self.config.connection_name, "Genie tool enabled");
                (DataQueryBridge::new(Some(service)), GenieStatus::Enabled)
            }
            Err(e) if self.config.connection_policy == ConnectionPolicy::Strict => {
                return Err(e.into());
            }
            Err(e) => {
                warn!(error = %e, "continuing without Genie");
                (
                    DataQueryBridge::default(),
                    GenieStatus::Disabled {
                        reason: e.to_string(),
                    },
                )
            }
        };

        let tools = ToolSet::none().with_function(Arc::new(bridge));
        let advertised = if genie == GenieStatus::Enabled {
            tools.clone()
        } else {
            ToolSet::none()
        };
        let agent = self.resolve_agent(&advertised).await?;

        let report = ConnectReport {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone().unwrap_or_else(|| agent.id.clone()),
            genie,
        };
        self.connected = Some(Connected {
            agent,
            executor: ToolExecutor::new(tools),
            thread_id: None,
        });
        Ok(Some(report))
    }

    /// Resolves the connection, validates it, and builds the data service.
    async fn setup_genie(&self) -> std::result::Result<Arc<dyn DataService>, ConnectionError> {
        let name = &self.config.connection_name;
        let connection =
            self.host
                .get_connection(name)
                .await
                .map_err(|e| ConnectionError::Lookup {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
        let space_id = genie_space_id(&connection)?;
        debug!(
            connection = name,
            space_id,
            target = connection.target,
            "resolved Genie connection"
        );
        self.data.create(&connection.target, space_id).await
    }

    /// Fetches the configured agent, or creates one from the model deployment.
    async fn resolve_agent(&self, tools: &ToolSet) -> std::result::Result<AgentInfo, AgentError> {
        if let Some(agent_id) = self.config.agent_id.as_deref() {
            let agent = self.host.get_agent(agent_id).await?;
            info!(agent_id, name = agent.name.as_deref().unwrap_or(""), "using existing agent");
            return Ok(agent);
        }

        let model = self
            .config
            .model_deployment
            .as_deref()
            .ok_or(AgentError::NoAgent)?;
        let definition = AgentDefinition {
            model: model.to_string(),
            name: self.config.agent_name.clone(),
            description: AGENT_DESCRIPTION.to_string(),
            instructions: self.config.agent_instructions.clone(),
            tools: tools.definitions(),
        };
        let agent = self.host.create_agent(&definition).await?;
        info!(agent_id = agent.id, model, "created agent");
        Ok(agent)
    }

    /// Asks one question and waits for the agent's answer.
    ///
    /// # Errors
    ///
    /// Returns connect errors (see [`Self::ensure_connected`]), host errors,
    /// and [`AgentError::PollBudgetExhausted`] if the run does not finish.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(Error::Agent(AgentError::Orchestration {
                message: "question cannot be empty".to_string(),
            }));
        }

        self.ensure_connected().await?;
        let Some(connected) = self.connected.as_mut() else {
            return Err(Error::Agent(AgentError::Orchestration {
                message: "not connected".to_string(),
            }));
        };
        let host = self.host.as_ref();

        let shared = self.config.thread_mode == ThreadMode::Shared;
        let thread_id = match connected.thread_id.clone().filter(|_| shared) {
            Some(id) => id,
            None => {
                let thread = host.create_thread().await?;
                debug!(thread_id = thread.id, "created thread");
                if shared {
                    connected.thread_id = Some(thread.id.clone());
                }
                thread.id
            }
        };

        host.create_message(&thread_id, Role::User, question).await?;
        let run = host.create_run(&thread_id, &connected.agent.id).await?;
        info!(thread_id, run_id = run.id, "run started");

        let run = drive_run(
            host,
            &connected.executor,
            self.sleeper.as_ref(),
            &self.config.run_poll,
            run,
        )
        .await?;

        if run.status != RunStatus::Completed {
            warn!(run_id = run.id, status = %run.status, "run did not complete");
            return Ok(Answer::RunFailed {
                status: run.status,
                error: run
                    .last_error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty()),
            });
        }

        let messages = host.list_messages(&thread_id).await?;
        Ok(select_reply(&messages, &run)
            .map_or(Answer::NoReply, |m| Answer::Reply(m.primary_text())))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::{Connection, PendingToolCalls, RequiredAction, Run};
    use crate::agent::testing::{MockHost, run};
    use crate::agent::tool::ToolCall;
    use crate::error::GenieError;
    use crate::genie::GenieResponse;
    use crate::poll::{PollStrategy, RecordingSleeper};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    struct FixedService;

    #[async_trait]
    impl DataService for FixedService {
        async fn ask_question(
            &self,
            _question: &str,
        ) -> std::result::Result<GenieResponse, GenieError> {
            Ok(GenieResponse {
                query: "SELECT 42".to_string(),
                result: "42".to_string(),
                description: "the answer".to_string(),
            })
        }
    }

    struct FixedFactory;

    #[async_trait]
    impl DataServiceFactory for FixedFactory {
        async fn create(
            &self,
            _host: &str,
            _space_id: &str,
        ) -> std::result::Result<Arc<dyn DataService>, ConnectionError> {
            Ok(Arc::new(FixedService))
        }
    }

    fn genie_connection(kind: &str) -> Connection {
        Connection {
            name: "dbx".to_string(),
            target: "https://adb-1.azuredatabricks.net".to_string(),
            metadata: HashMap::from([
                ("azure_databricks_connection_type".to_string(), kind.to_string()),
                ("genie_space_id".to_string(), "space-1".to_string()),
            ]),
        }
    }

    fn config() -> crate::agent::config::AgentConfigBuilder {
        AgentConfig::builder()
            .endpoint("http://unused")
            .connection_name("dbx")
            .run_poll(PollStrategy::fixed(Duration::from_millis(1), 10))
    }

    fn existing_agent() -> AgentConfig {
        config()
            .agent_id("asst_1")
            .build()
            .unwrap_or_else(|e| panic!("{e}"))
    }

    fn host_with_agent() -> Arc<MockHost> {
        let host = Arc::new(MockHost::default());
        host.set_agent(AgentInfo {
            id: "asst_1".to_string(),
            name: Some("Taxi Analyst".to_string()),
            model: "gpt-4o".to_string(),
        });
        host
    }

    fn orchestrator(host: &Arc<MockHost>, config: AgentConfig) -> Orchestrator {
        Orchestrator::new(
            host.clone(),
            Arc::new(FixedFactory),
            Arc::new(RecordingSleeper::new()),
            config,
        )
    }

    fn genie_call_run(id: &str, thread_id: &str) -> Run {
        Run {
            required_action: Some(RequiredAction::SubmitToolOutputs {
                submit_tool_outputs: PendingToolCalls {
                    tool_calls: vec![ToolCall {
                        id: "call_1".to_string(),
                        name: "ask_genie".to_string(),
                        arguments: r#"{"question":"average tip"}"#.to_string(),
                    }],
                },
            }),
            ..run(id, thread_id, RunStatus::RequiresAction, 0)
        }
    }

    #[tokio::test]
    async fn test_happy_path_with_tool_call() {
        let host = host_with_agent();
        host.set_connection(genie_connection("genie"));
        host.push_created_runs([genie_call_run("run_1", "thread_1")]);
        host.push_submit_responses([run("run_1", "thread_1", RunStatus::InProgress, 0)]);
        host.push_runs([run("run_1", "thread_1", RunStatus::Completed, 0)]);
        host.push_assistant_message("thread_1", "42", Some("run_1"));

        let mut orch = orchestrator(&host, existing_agent());
        let report = orch
            .ensure_connected()
            .await
            .unwrap_or_else(|e| panic!("connect failed: {e}"));
        assert_eq!(
            report,
            Some(ConnectReport {
                agent_id: "asst_1".to_string(),
                agent_name: "Taxi Analyst".to_string(),
                genie: GenieStatus::Enabled,
            })
        );

        let answer = orch
            .ask("What is the average tip on a Friday?")
            .await
            .unwrap_or_else(|e| panic!("ask failed: {e}"));

        assert_eq!(answer, Answer::Reply("42".to_string()));
        assert_eq!(
            host.user_messages(),
            vec!["What is the average tip on a Friday?".to_string()]
        );
        let submitted = host.submitted_outputs();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0][0].output.contains("SELECT 42"));
    }

    #[tokio::test]
    async fn test_shared_thread_selects_latest_reply() {
        let host = host_with_agent();
        host.set_connection(genie_connection("genie"));
        host.push_created_runs([
            run("run_1", "thread_1", RunStatus::Completed, 0),
            run("run_2", "thread_1", RunStatus::Completed, 0),
        ]);
        host.push_assistant_message("thread_1", "first answer", Some("run_1"));
        host.push_assistant_message("thread_1", "second answer", Some("run_2"));

        let config = config()
            .agent_id("asst_1")
            .thread_mode(ThreadMode::Shared)
            .build()
            .unwrap_or_else(|e| panic!("{e}"));
        let mut orch = orchestrator(&host, config);

        let first = orch.ask("first").await.unwrap_or_else(|e| panic!("{e}"));
        let second = orch.ask("second").await.unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(first, Answer::Reply("first answer".to_string()));
        assert_eq!(second, Answer::Reply("second answer".to_string()));
        assert_eq!(host.threads_created(), 1);
    }

    #[tokio::test]
    async fn test_per_question_threads() {
        let host = host_with_agent();
        host.set_connection(genie_connection("genie"));
        host.push_created_runs([
            run("run_1", "thread_1", RunStatus::Completed, 0),
            run("run_2", "thread_2", RunStatus::Completed, 0),
        ]);
        let mut orch = orchestrator(&host, existing_agent());

        orch.ask("one").await.unwrap_or_else(|e| panic!("{e}"));
        orch.ask("two").await.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(host.threads_created(), 2);
    }

    #[tokio::test]
    async fn test_failed_run_skips_message_listing() {
        let host = host_with_agent();
        host.set_connection(genie_connection("genie"));
        let mut failed = run("run_1", "thread_1", RunStatus::Failed, 0);
        failed.last_error = Some(crate::agent::message::RunError {
            code: "rate_limit_exceeded".to_string(),
            message: "Rate limit reached".to_string(),
        });
        host.push_created_runs([failed]);

        let mut orch = orchestrator(&host, existing_agent());
        let answer = orch.ask("q").await.unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(
            answer,
            Answer::RunFailed {
                status: RunStatus::Failed,
                error: Some("Rate limit reached".to_string()),
            }
        );
        assert!(answer.to_string().contains("failed"));
        assert_eq!(host.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_wrong_connection_type() {
        let host = host_with_agent();
        host.set_connection(genie_connection("sql_warehouse"));
        let config = config()
            .agent_id("asst_1")
            .connection_policy(ConnectionPolicy::Strict)
            .build()
            .unwrap_or_else(|e| panic!("{e}"));
        let mut orch = orchestrator(&host, config);

        let err = orch
            .ask("q")
            .await
            .err()
            .unwrap_or_else(|| panic!("strict policy should fail"));
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::WrongType { .. })
        ));
        assert!(!orch.is_connected());
        assert_eq!(host.threads_created(), 0);
    }

    #[tokio::test]
    async fn test_degraded_policy_reports_and_leaves_bridge_unset() {
        let host = host_with_agent();
        host.set_connection(genie_connection("sql_warehouse"));
        host.push_created_runs([genie_call_run("run_1", "thread_1")]);
        host.push_submit_responses([run("run_1", "thread_1", RunStatus::Completed, 0)]);
        host.push_assistant_message("thread_1", "Genie is unavailable.", Some("run_1"));

        let mut orch = orchestrator(&host, existing_agent());
        let report = orch
            .ensure_connected()
            .await
            .unwrap_or_else(|e| panic!("{e}"))
            .unwrap_or_else(|| panic!("expected a report"));
        match &report.genie {
            GenieStatus::Disabled { reason } => assert!(reason.contains("not of type 'genie'")),
            GenieStatus::Enabled => panic!("Genie should be disabled"),
        }

        let answer = orch.ask("q").await.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(answer, Answer::Reply("Genie is unavailable.".to_string()));
        assert_eq!(
            host.submitted_outputs()[0][0].output,
            r#"{"error":"Genie is not initialized"}"#
        );
    }

    #[tokio::test]
    async fn test_degraded_policy_survives_lookup_failure() {
        let host = host_with_agent();
        let mut orch = orchestrator(&host, existing_agent());
        let report = orch
            .ensure_connected()
            .await
            .unwrap_or_else(|e| panic!("{e}"))
            .unwrap_or_else(|| panic!("expected a report"));
        assert!(matches!(report.genie, GenieStatus::Disabled { .. }));
        assert_eq!(orch.ensure_connected().await.ok(), Some(None));
    }

    #[tokio::test]
    async fn test_creates_agent_from_model_deployment() {
        let host = Arc::new(MockHost::default());
        host.set_connection(genie_connection("genie"));
        let config = config()
            .model_deployment("gpt-4o")
            .build()
            .unwrap_or_else(|e| panic!("{e}"));
        let mut orch = orchestrator(&host, config);

        let report = orch
            .ensure_connected()
            .await
            .unwrap_or_else(|e| panic!("{e}"))
            .unwrap_or_else(|| panic!("expected a report"));

        assert_eq!(report.agent_name, "Databricks Agent");
        let created = host.agents_created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].model, "gpt-4o");
        assert_eq!(created[0].tools.len(), 1);
        assert_eq!(created[0].tools[0].name, "ask_genie");
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let host = host_with_agent();
        let mut orch = orchestrator(&host, existing_agent());
        assert!(orch.ask("   ").await.is_err());
        assert!(!orch.is_connected());
    }

    #[test]
    fn test_answer_display() {
        assert_eq!(Answer::Reply("42".to_string()).to_string(), "Agent: 42");
        assert_eq!(
            Answer::RunFailed {
                status: RunStatus::Expired,
                error: None
            }
            .to_string(),
            "Run failed with status: expired"
        );
    }
}
