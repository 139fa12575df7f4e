//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::time::Duration;

use crate::error::ConfigError;
use crate::poll::PollStrategy;

/// Well-known Entra ID audience for Azure Databricks.
pub const DATABRICKS_AUDIENCE_SCOPE: &str = "2ff814a6-3304-4ab8-85cb-cd0e6f879c1d/.default";
/// Audience for the Foundry agent service.
pub const FOUNDRY_AUDIENCE_SCOPE: &str = "https://ai.azure.com/.default";
/// Integration tag reported upstream to Databricks.
pub const DEFAULT_UPSTREAM: &str = "AzureAIFoundry";
/// Integration version reported upstream to Databricks.
pub const DEFAULT_UPSTREAM_VERSION: &str = "1.0.0";

/// Default API version for the agent host.
const DEFAULT_API_VERSION: &str = "v1";
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default run poll interval in milliseconds.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
/// Default maximum run polls.
const DEFAULT_MAX_POLLS: u32 = 300;
/// Default Genie poll interval in seconds.
const DEFAULT_GENIE_POLL_SECS: u64 = 5;
/// Default maximum Genie polls.
const DEFAULT_GENIE_MAX_POLLS: u32 = 50;
/// Default row cap when rendering Genie query results.
const DEFAULT_GENIE_MAX_ROWS: usize = 100;
/// Name given to agents created from a model deployment.
const DEFAULT_AGENT_NAME: &str = "Databricks Agent";
/// Instructions given to agents created from a model deployment.
const DEFAULT_AGENT_INSTRUCTIONS: &str = "You're a helpful assistant, use the Databricks Genie to \
    answer questions. Always use the ask_genie function for data queries and then provide a \
    clear, helpful interpretation of the results to the user.";

/// What to do when the Genie connection cannot be set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPolicy {
    /// Report the failure and run the agent without the Genie tool.
    #[default]
    Degraded,
    /// Fail the connect step.
    Strict,
}

impl ConnectionPolicy {
    /// Parses a policy name (`degraded` or `strict`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degraded" => Some(Self::Degraded),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// How threads are allocated to questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadMode {
    /// A fresh thread for every question.
    #[default]
    PerQuestion,
    /// One thread for the whole session (multi-turn).
    Shared,
}

impl ThreadMode {
    /// Parses a thread mode (`per-question` or `shared`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-question" | "per_question" => Some(Self::PerQuestion),
            "shared" => Some(Self::Shared),
            _ => None,
        }
    }
}

/// Configuration for the agent session.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Foundry project endpoint.
    pub endpoint: String,
    /// Agent host API version query parameter.
    pub api_version: String,
    /// Name of the Databricks connection in the project.
    pub connection_name: String,
    /// Existing agent to talk to.
    pub agent_id: Option<String>,
    /// Model deployment used to create an agent when no id is set.
    pub model_deployment: Option<String>,
    /// Name for created agents.
    pub agent_name: String,
    /// Instructions for created agents.
    pub agent_instructions: String,
    /// Behavior when the Genie connection cannot be set up.
    pub connection_policy: ConnectionPolicy,
    /// Thread allocation.
    pub thread_mode: ThreadMode,
    /// Run status polling.
    pub run_poll: PollStrategy,
    /// Genie message polling.
    pub genie_poll: PollStrategy,
    /// Maximum rows rendered from a Genie query result.
    pub genie_max_rows: usize,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Upstream integration tag sent to Databricks.
    pub upstream: String,
    /// Upstream integration version sent to Databricks.
    pub upstream_version: String,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required setting is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env()?.build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    endpoint: Option<String>,
    api_version: Option<String>,
    connection_name: Option<String>,
    agent_id: Option<String>,
    model_deployment: Option<String>,
    agent_name: Option<String>,
    agent_instructions: Option<String>,
    connection_policy: Option<ConnectionPolicy>,
    thread_mode: Option<ThreadMode>,
    run_poll: Option<PollStrategy>,
    genie_poll: Option<PollStrategy>,
    genie_max_rows: Option<usize>,
    timeout: Option<Duration>,
    upstream: Option<String>,
    upstream_version: Option<String>,
}

/// Reads a non-empty environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Reads and parses a numeric environment variable.
fn env_parse<T: std::str::FromStr>(
    name: &'static str,
    setting: &'static str,
) -> Result<Option<T>, ConfigError> {
    env_var(name)
        .map(|v| {
            v.trim().parse().map_err(|_| ConfigError::Invalid {
                name: setting,
                value: v.clone(),
            })
        })
        .transpose()
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for values that do not parse.
    pub fn from_env(mut self) -> Result<Self, ConfigError> {
        if self.endpoint.is_none() {
            self.endpoint = env_var("FOUNDRY_PROJECT_ENDPOINT");
        }
        if self.api_version.is_none() {
            self.api_version = env_var("GENIE_AGENT_API_VERSION");
        }
        if self.connection_name.is_none() {
            self.connection_name = env_var("FOUNDRY_DATABRICKS_CONNECTION_NAME");
        }
        if self.agent_id.is_none() {
            self.agent_id = env_var("FOUNDRY_AGENT_ID");
        }
        if self.model_deployment.is_none() {
            self.model_deployment = env_var("MODEL_DEPLOYMENT_NAME");
        }
        if self.connection_policy.is_none() {
            self.connection_policy = env_var("GENIE_AGENT_CONNECTION_POLICY")
                .map(|v| {
                    ConnectionPolicy::parse(&v).ok_or(ConfigError::Invalid {
                        name: "connection_policy",
                        value: v,
                    })
                })
                .transpose()?;
        }
        if self.thread_mode.is_none() {
            self.thread_mode = env_var("GENIE_AGENT_THREAD_MODE")
                .map(|v| {
                    ThreadMode::parse(&v).ok_or(ConfigError::Invalid {
                        name: "thread_mode",
                        value: v,
                    })
                })
                .transpose()?;
        }
        if self.run_poll.is_none() {
            let interval = env_parse::<u64>("GENIE_AGENT_POLL_INTERVAL_MS", "poll_interval")?;
            let max_polls = env_parse::<u32>("GENIE_AGENT_MAX_POLLS", "max_polls")?;
            if interval.is_some() || max_polls.is_some() {
                self.run_poll = Some(PollStrategy::fixed(
                    Duration::from_millis(interval.unwrap_or(DEFAULT_POLL_INTERVAL_MS)),
                    max_polls.unwrap_or(DEFAULT_MAX_POLLS),
                ));
            }
        }
        if self.timeout.is_none() {
            self.timeout =
                env_parse::<u64>("GENIE_AGENT_TIMEOUT_SECS", "timeout")?.map(Duration::from_secs);
        }
        if self.upstream.is_none() {
            self.upstream = env_var("DATABRICKS_SDK_UPSTREAM");
        }
        if self.upstream_version.is_none() {
            self.upstream_version = env_var("DATABRICKS_SDK_UPSTREAM_VERSION");
        }
        Ok(self)
    }

    /// Sets the project endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the agent host API version.
    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Sets the Databricks connection name.
    #[must_use]
    pub fn connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }

    /// Sets the agent id.
    #[must_use]
    pub fn agent_id(mut self, id: impl Into<String>) -> Self {
        self.agent_id = Some(id.into());
        self
    }

    /// Sets the model deployment used to create an agent.
    #[must_use]
    pub fn model_deployment(mut self, model: impl Into<String>) -> Self {
        self.model_deployment = Some(model.into());
        self
    }

    /// Sets the name for created agents.
    #[must_use]
    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = Some(name.into());
        self
    }

    /// Sets the instructions for created agents.
    #[must_use]
    pub fn agent_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.agent_instructions = Some(instructions.into());
        self
    }

    /// Sets the connection failure policy.
    #[must_use]
    pub const fn connection_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.connection_policy = Some(policy);
        self
    }

    /// Sets the thread mode.
    #[must_use]
    pub const fn thread_mode(mut self, mode: ThreadMode) -> Self {
        self.thread_mode = Some(mode);
        self
    }

    /// Sets the run poll strategy.
    #[must_use]
    pub const fn run_poll(mut self, strategy: PollStrategy) -> Self {
        self.run_poll = Some(strategy);
        self
    }

    /// Sets the Genie poll strategy.
    #[must_use]
    pub const fn genie_poll(mut self, strategy: PollStrategy) -> Self {
        self.genie_poll = Some(strategy);
        self
    }

    /// Sets the row cap for rendered Genie results.
    #[must_use]
    pub const fn genie_max_rows(mut self, n: usize) -> Self {
        self.genie_max_rows = Some(n);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if the endpoint, the connection name,
    /// or both of agent id and model deployment are absent.
    pub fn build(self) -> Result<AgentConfig, ConfigError> {
        let endpoint = self.endpoint.ok_or(ConfigError::Missing {
            name: "endpoint",
            env: "FOUNDRY_PROJECT_ENDPOINT",
        })?;
        let connection_name = self.connection_name.ok_or(ConfigError::Missing {
            name: "connection_name",
            env: "FOUNDRY_DATABRICKS_CONNECTION_NAME",
        })?;
        if self.agent_id.is_none() && self.model_deployment.is_none() {
            return Err(ConfigError::Missing {
                name: "agent_id",
                env: "FOUNDRY_AGENT_ID or MODEL_DEPLOYMENT_NAME",
            });
        }

        Ok(AgentConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            connection_name,
            agent_id: self.agent_id,
            model_deployment: self.model_deployment,
            agent_name: self
                .agent_name
                .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
            agent_instructions: self
                .agent_instructions
                .unwrap_or_else(|| DEFAULT_AGENT_INSTRUCTIONS.to_string()),
            connection_policy: self.connection_policy.unwrap_or_default(),
            thread_mode: self.thread_mode.unwrap_or_default(),
            run_poll: self.run_poll.unwrap_or_default(),
            genie_poll: self.genie_poll.unwrap_or_else(|| {
                PollStrategy::fixed(
                    Duration::from_secs(DEFAULT_GENIE_POLL_SECS),
                    DEFAULT_GENIE_MAX_POLLS,
                )
            }),
            genie_max_rows: self.genie_max_rows.unwrap_or(DEFAULT_GENIE_MAX_ROWS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            upstream: self
                .upstream
                .unwrap_or_else(|| DEFAULT_UPSTREAM.to_string()),
            upstream_version: self
                .upstream_version
                .unwrap_or_else(|| DEFAULT_UPSTREAM_VERSION.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn base() -> AgentConfigBuilder {
        AgentConfig::builder()
            .endpoint("https://example.services.ai.azure.com/api/projects/p1/")
            .connection_name("my-databricks")
    }

    #[test]
    fn test_builder_defaults() {
        let config = base()
            .agent_id("asst_123")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            config.endpoint,
            "https://example.services.ai.azure.com/api/projects/p1"
        );
        assert_eq!(config.api_version, "v1");
        assert_eq!(config.connection_policy, ConnectionPolicy::Degraded);
        assert_eq!(config.thread_mode, ThreadMode::PerQuestion);
        assert_eq!(config.run_poll, PollStrategy::default());
        assert_eq!(config.genie_poll.interval, Duration::from_secs(5));
        assert_eq!(config.genie_poll.max_attempts, 50);
        assert_eq!(config.upstream, "AzureAIFoundry");
        assert_eq!(config.upstream_version, "1.0.0");
        assert_eq!(config.agent_name, "Databricks Agent");
    }

    #[test]
    fn test_builder_missing_endpoint() {
        let result = AgentConfig::builder()
            .connection_name("c")
            .agent_id("a")
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::Missing {
                name: "endpoint",
                ..
            })
        ));
    }

    #[test]
    fn test_builder_requires_agent_or_model() {
        let result = base().build();
        assert!(matches!(
            result,
            Err(ConfigError::Missing {
                name: "agent_id",
                ..
            })
        ));
    }

    #[test]
    fn test_builder_model_only() {
        let config = base()
            .model_deployment("gpt-4o")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(config.agent_id.is_none());
        assert_eq!(config.model_deployment.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = base()
            .agent_id("asst_1")
            .connection_policy(ConnectionPolicy::Strict)
            .thread_mode(ThreadMode::Shared)
            .run_poll(PollStrategy::fixed(Duration::from_millis(10), 3))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.connection_policy, ConnectionPolicy::Strict);
        assert_eq!(config.thread_mode, ThreadMode::Shared);
        assert_eq!(config.run_poll.max_attempts, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test_case("strict", Some(ConnectionPolicy::Strict))]
    #[test_case(" Degraded ", Some(ConnectionPolicy::Degraded))]
    #[test_case("lenient", None)]
    fn test_connection_policy_parse(input: &str, expected: Option<ConnectionPolicy>) {
        assert_eq!(ConnectionPolicy::parse(input), expected);
    }

    #[test_case("shared", Some(ThreadMode::Shared))]
    #[test_case("per-question", Some(ThreadMode::PerQuestion))]
    #[test_case("PER_QUESTION", Some(ThreadMode::PerQuestion))]
    #[test_case("forever", None)]
    fn test_thread_mode_parse(input: &str, expected: Option<ThreadMode>) {
        assert_eq!(ThreadMode::parse(input), expected);
    }
}
