//! Azure AI Foundry agent host over REST.
//!
//! Speaks the assistants-style threads/runs API exposed under a Foundry
//! project endpoint. Every request carries a bearer token for the Foundry
//! audience and the configured `api-version`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::agent::config::{AgentConfig, FOUNDRY_AUDIENCE_SCOPE};
use crate::agent::host::AgentHost;
use crate::agent::message::{
    AgentDefinition, AgentInfo, Connection, Role, Run, Thread, ThreadMessage, ToolOutput,
};
use crate::credential::TokenCredential;
use crate::error::AgentError;

/// Page size when listing messages.
const MESSAGE_PAGE_SIZE: u32 = 100;

/// Foundry project client.
pub struct FoundryHost {
    http: reqwest::Client,
    endpoint: String,
    api_version: String,
    credential: Arc<dyn TokenCredential>,
}

#[derive(Deserialize)]
struct MessagePage {
    data: Vec<ThreadMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

impl FoundryHost {
    /// Creates a host client from configuration.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        config: &AgentConfig,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        Self {
            http,
            endpoint: config.endpoint.clone(),
            api_version: config.api_version.clone(),
            credential,
        }
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AgentError> {
        let token = self.credential.get_token(FOUNDRY_AUDIENCE_SCOPE).await?;
        let url = format!("{}{path}", self.endpoint);
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token.token)
            .query(&[("api-version", self.api_version.as_str())]))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AgentError> {
        let response = request.send().await.map_err(|e| AgentError::ApiRequest {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ApiRequest {
                message: error_message(&body),
                status: Some(status.as_u16()),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AgentError::ResponseParse {
                message: e.to_string(),
            })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AgentError> {
        let request = self.request(Method::GET, path).await?;
        self.send(request).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, AgentError> {
        let request = self.request(Method::POST, path).await?.json(body);
        self.send(request).await
    }
}

/// Extracts `error.message` from a host error body, or returns the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

impl std::fmt::Debug for FoundryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoundryHost")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("credential", &self.credential.name())
            .finish()
    }
}

#[async_trait]
impl AgentHost for FoundryHost {
    fn name(&self) -> &'static str {
        "foundry"
    }

    async fn get_connection(&self, name: &str) -> Result<Connection, AgentError> {
        self.get(&format!("/connections/{name}")).await
    }

    async fn get_agent(&self, agent_id: &str) -> Result<AgentInfo, AgentError> {
        self.get(&format!("/assistants/{agent_id}")).await
    }

    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentInfo, AgentError> {
        let body = serde_json::to_value(definition).map_err(|e| AgentError::Orchestration {
            message: format!("could not encode agent definition: {e}"),
        })?;
        self.post("/assistants", &body).await
    }

    async fn create_thread(&self) -> Result<Thread, AgentError> {
        self.post("/threads", &json!({})).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ThreadMessage, AgentError> {
        self.post(
            &format!("/threads/{thread_id}/messages"),
            &json!({ "role": role, "content": content }),
        )
        .await
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run, AgentError> {
        self.post(
            &format!("/threads/{thread_id}/runs"),
            &json!({ "assistant_id": agent_id }),
        )
        .await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        self.get(&format!("/threads/{thread_id}/runs/{run_id}")).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, AgentError> {
        self.post(
            &format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            &json!({ "tool_outputs": outputs }),
        )
        .await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        self.post(&format!("/threads/{thread_id}/runs/{run_id}/cancel"), &json!({}))
            .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
        let path = format!("/threads/{thread_id}/messages");
        let limit = MESSAGE_PAGE_SIZE.to_string();
        let mut messages = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::GET, &path)
                .await?
                .query(&[("order", "asc"), ("limit", limit.as_str())]);
            if let Some(cursor) = after.as_deref() {
                request = request.query(&[("after", cursor)]);
            }
            let page: MessagePage = self.send(request).await?;
            debug!(thread_id, count = page.data.len(), has_more = page.has_more, "listed messages");
            messages.extend(page.data);

            match (page.has_more, page.last_id) {
                (true, Some(last)) => after = Some(last),
                _ => break,
            }
        }

        Ok(messages)
    }
}
