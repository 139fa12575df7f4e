//! Databricks Genie conversation client.
//!
//! A question starts a Genie conversation; the resulting message is polled
//! until Genie finishes. A query attachment is resolved by fetching its
//! statement result and rendering it as a Markdown table. A text-only
//! attachment is returned as the result verbatim.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::agent::config::DATABRICKS_AUDIENCE_SCOPE;
use crate::credential::TokenCredential;
use crate::error::GenieError;
use crate::poll::{PollStrategy, Sleeper};

/// Normalized answer from the data service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenieResponse {
    /// Generated query text (empty for text-only answers).
    pub query: String,
    /// Result payload (Markdown table or text).
    pub result: String,
    /// Human-readable description of the query.
    pub description: String,
}

/// A conversational data-query service.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Asks a natural-language question.
    ///
    /// # Errors
    ///
    /// Returns [`GenieError`] on transport, status or protocol failures.
    async fn ask_question(&self, question: &str) -> Result<GenieResponse, GenieError>;
}

/// Telemetry identifying the calling integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// Integration tag.
    pub tag: String,
    /// Integration version.
    pub version: String,
}

impl Upstream {
    /// `User-Agent` value carrying the upstream tag and version.
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} upstream/{} upstream-version/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.tag,
            self.version
        )
    }
}

/// REST client for one Genie space.
pub struct GenieClient {
    http: reqwest::Client,
    host: String,
    credential: Arc<dyn TokenCredential>,
    space_id: String,
    user_agent: String,
    poll: PollStrategy,
    sleeper: Arc<dyn Sleeper>,
    max_rows: usize,
}

#[derive(Deserialize)]
struct StartConversation {
    conversation_id: String,
    message_id: String,
}

#[derive(Deserialize)]
struct GenieMessage {
    status: String,
    #[serde(default)]
    attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    error: Option<MessageError>,
}

#[derive(Deserialize)]
struct MessageError {
    #[serde(default)]
    error: String,
}

#[derive(Deserialize)]
struct Attachment {
    #[serde(default)]
    attachment_id: Option<String>,
    #[serde(default)]
    query: Option<QueryAttachment>,
    #[serde(default)]
    text: Option<TextAttachment>,
}

#[derive(Deserialize)]
struct QueryAttachment {
    #[serde(default)]
    query: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct TextAttachment {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct QueryResult {
    statement_response: StatementResponse,
}

#[derive(Deserialize)]
struct StatementResponse {
    #[serde(default)]
    manifest: Option<Manifest>,
    #[serde(default)]
    result: Option<ResultData>,
}

#[derive(Deserialize)]
struct Manifest {
    schema: Schema,
}

#[derive(Deserialize)]
struct Schema {
    #[serde(default)]
    columns: Vec<Column>,
}

#[derive(Deserialize)]
struct Column {
    name: String,
}

#[derive(Deserialize)]
struct ResultData {
    #[serde(default)]
    data_array: Vec<Vec<serde_json::Value>>,
}

/// Genie message statuses that end polling.
fn is_terminal(status: &str) -> bool {
    matches!(
        status,
        "COMPLETED" | "FAILED" | "CANCELLED" | "QUERY_RESULT_EXPIRED"
    )
}

impl GenieClient {
    /// Creates a client for `space_id` on the workspace at `host`.
    ///
    /// A Databricks-audience token is requested from `credential` for every
    /// call, so a caching credential keeps long sessions authenticated.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: reqwest::Client,
        host: &str,
        credential: Arc<dyn TokenCredential>,
        space_id: impl Into<String>,
        upstream: &Upstream,
        poll: PollStrategy,
        sleeper: Arc<dyn Sleeper>,
        max_rows: usize,
    ) -> Self {
        Self {
            http,
            host: host.trim_end_matches('/').to_string(),
            credential,
            space_id: space_id.into(),
            user_agent: upstream.user_agent(),
            poll,
            sleeper,
            max_rows,
        }
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, GenieError> {
        let token = self.credential.get_token(DATABRICKS_AUDIENCE_SCOPE).await?;
        let url = format!("{}/api/2.0/genie/spaces/{}{path}", self.host, self.space_id);
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token.token)
            .header(reqwest::header::USER_AGENT, &self.user_agent))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, GenieError> {
        let response = request.send().await.map_err(|e| GenieError::Request {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenieError::Request {
                message: body,
                status: Some(status.as_u16()),
            });
        }

        response.json::<T>().await.map_err(|e| GenieError::ResponseParse {
            message: e.to_string(),
        })
    }

    async fn wait_for_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<GenieMessage, GenieError> {
        let path = format!("/conversations/{conversation_id}/messages/{message_id}");
        for attempt in 0..self.poll.max_attempts {
            let message: GenieMessage =
                Self::send(self.request(Method::GET, &path).await?).await?;
            debug!(conversation_id, message_id, status = message.status, attempt, "polled Genie");
            if is_terminal(&message.status) {
                return Ok(message);
            }
            self.sleeper.sleep(self.poll.delay(attempt)).await;
        }
        Err(GenieError::PollBudgetExhausted {
            attempts: self.poll.max_attempts,
        })
    }

    async fn fetch_result(
        &self,
        conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<String, GenieError> {
        let path = format!(
            "/conversations/{conversation_id}/messages/{message_id}/attachments/{attachment_id}/query-result"
        );
        let result: QueryResult = Self::send(self.request(Method::GET, &path).await?).await?;
        Ok(render_table(&result.statement_response, self.max_rows))
    }
}

/// Renders a statement result as a Markdown table, capped at `max_rows`.
fn render_table(statement: &StatementResponse, max_rows: usize) -> String {
    let columns: Vec<&str> = statement
        .manifest
        .as_ref()
        .map(|m| m.schema.columns.iter().map(|c| c.name.as_str()).collect())
        .unwrap_or_default();
    let rows: &[Vec<serde_json::Value>] = statement
        .result
        .as_ref()
        .map_or(&[], |r| r.data_array.as_slice());

    if columns.is_empty() {
        return String::new();
    }

    let cell = |v: &serde_json::Value| match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.replace('|', "\\|"),
        other => other.to_string(),
    };

    let mut out = String::new();
    let _ = writeln!(out, "| {} |", columns.join(" | "));
    let _ = writeln!(
        out,
        "|{}|",
        columns.iter().map(|_| "---").collect::<Vec<_>>().join("|")
    );
    for row in rows.iter().take(max_rows) {
        let cells: Vec<String> = row.iter().map(cell).collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }
    if rows.len() > max_rows {
        let _ = writeln!(out, "\n({} more rows not shown)", rows.len() - max_rows);
    }
    out.trim_end().to_string()
}

impl std::fmt::Debug for GenieClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenieClient")
            .field("host", &self.host)
            .field("space_id", &self.space_id)
            .field("credential", &self.credential.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DataService for GenieClient {
    async fn ask_question(&self, question: &str) -> Result<GenieResponse, GenieError> {
        let started: StartConversation = Self::send(
            self.request(Method::POST, "/start-conversation")
                .await?
                .json(&json!({ "content": question })),
        )
        .await?;
        info!(
            space_id = self.space_id,
            conversation_id = started.conversation_id,
            "started Genie conversation"
        );

        let message = self
            .wait_for_message(&started.conversation_id, &started.message_id)
            .await?;

        if message.status != "COMPLETED" {
            return Err(GenieError::MessageFailed {
                status: message.status,
                message: message.error.map(|e| e.error).unwrap_or_default(),
            });
        }

        let attachments = message.attachments.unwrap_or_default();

        if let Some((attachment_id, query)) = attachments
            .iter()
            .find_map(|a| Some((a.attachment_id.as_deref()?, a.query.as_ref()?)))
        {
            let result = self
                .fetch_result(&started.conversation_id, &started.message_id, attachment_id)
                .await?;
            return Ok(GenieResponse {
                query: query.query.clone(),
                result,
                description: query.description.clone(),
            });
        }

        let text = attachments
            .iter()
            .filter_map(|a| a.text.as_ref())
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(GenieResponse {
            query: String::new(),
            result: text,
            description: String::new(),
        })
    }
}
