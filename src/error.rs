//! Error types for genie-agent.
//!
//! Each concern owns its own error enum; [`Error`] unifies them for the
//! session layer. The data-query bridge converts [`GenieError`] into a JSON
//! payload and never lets it escape.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A bearer token could not be acquired.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The named data connection could not be used.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The agent host rejected a request or a run misbehaved.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Terminal I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("missing required setting: {name} (set {env})")]
    Missing {
        /// Setting name.
        name: &'static str,
        /// Environment variable that supplies it.
        env: &'static str,
    },

    /// A setting had an unparsable value.
    #[error("invalid value for {name}: {value:?}")]
    Invalid {
        /// Setting name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Token acquisition errors.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A specific credential source failed.
    #[error("{source_name} credential failed: {message}")]
    Unavailable {
        /// Credential source name (e.g. `"azure-cli"`).
        source_name: &'static str,
        /// Failure detail.
        message: String,
    },

    /// Every source in a chain failed.
    #[error("no credential source succeeded: {}", .attempts.join("; "))]
    Exhausted {
        /// One message per attempted source.
        attempts: Vec<String>,
    },
}

/// Errors resolving the named data-service connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection lookup failed on the agent host.
    #[error("could not retrieve connection '{name}': {message}")]
    Lookup {
        /// Connection name.
        name: String,
        /// Failure detail.
        message: String,
    },

    /// Connection exists but is not a Genie connection.
    #[error("connection '{name}' is not of type 'genie' (found {found:?})")]
    WrongType {
        /// Connection name.
        name: String,
        /// Type marker found in metadata, if any.
        found: Option<String>,
    },

    /// Connection metadata lacks a required key.
    #[error("connection '{name}' metadata is missing '{key}'")]
    MissingMetadata {
        /// Connection name.
        name: String,
        /// Missing metadata key.
        key: &'static str,
    },

    /// Token acquisition for the data service failed.
    #[error("could not authenticate to the data service: {0}")]
    Credential(#[from] CredentialError),

    /// The data-service client could not be built.
    #[error("could not create data-service client: {message}")]
    Client {
        /// Failure detail.
        message: String,
    },
}

/// Errors from the Databricks Genie data service.
#[derive(Debug, Error)]
pub enum GenieError {
    /// HTTP transport or status failure.
    #[error(
        "Genie request failed{}: {message}",
        .status.map(|s| format!(" ({s})")).unwrap_or_default()
    )]
    Request {
        /// Failure detail.
        message: String,
        /// HTTP status, if a response was received.
        status: Option<u16>,
    },

    /// Response body could not be decoded.
    #[error("failed to parse Genie response: {message}")]
    ResponseParse {
        /// Failure detail.
        message: String,
    },

    /// The Genie message reached a non-success terminal status.
    #[error("Genie message ended with status {status}: {message}")]
    MessageFailed {
        /// Terminal status.
        status: String,
        /// Failure detail reported by the service.
        message: String,
    },

    /// The message did not complete within the poll budget.
    #[error("Genie did not answer after {attempts} polls")]
    PollBudgetExhausted {
        /// Polls performed.
        attempts: u32,
    },

    /// A Databricks token could not be acquired.
    #[error("could not authenticate to Genie: {0}")]
    Credential(#[from] CredentialError),
}

/// Errors from the agent host and the run loop.
#[derive(Debug, Error)]
pub enum AgentError {
    /// API request failed.
    #[error(
        "agent host request failed{}: {message}",
        .status.map(|s| format!(" ({s})")).unwrap_or_default()
    )]
    ApiRequest {
        /// Failure detail.
        message: String,
        /// HTTP status, if a response was received.
        status: Option<u16>,
    },

    /// Response body could not be decoded.
    #[error("failed to parse agent host response: {message}")]
    ResponseParse {
        /// Failure detail.
        message: String,
    },

    /// Token acquisition for the agent host failed.
    #[error("could not authenticate to the agent host: {0}")]
    Credential(#[from] CredentialError),

    /// The run did not reach a terminal status within the poll budget.
    #[error("run {run_id} still {last_status} after {attempts} polls")]
    PollBudgetExhausted {
        /// Run identifier.
        run_id: String,
        /// Last observed status.
        last_status: String,
        /// Polls performed.
        attempts: u32,
    },

    /// The host asked for an action the client cannot satisfy.
    #[error("run {run_id} requested an unsupported action: {message}")]
    UnsupportedAction {
        /// Run identifier.
        run_id: String,
        /// Failure detail.
        message: String,
    },

    /// Neither an agent id nor a model deployment was configured.
    #[error("no agent id or model deployment configured")]
    NoAgent,

    /// Orchestration-level failure.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Failure detail.
        message: String,
    },
}
