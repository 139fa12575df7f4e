//! The `ask_genie` tool: a data-query bridge that never fails.
//!
//! Whatever happens downstream, the agent gets back a JSON object: either
//! `{query, result, description}` or `{error}`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::client::DataService;
use crate::agent::tool::{ToolDefinition, ToolFunction};

/// Tool name advertised to the agent.
pub const TOOL_NAME: &str = "ask_genie";
/// Error reported when no data service is attached.
pub const NOT_INITIALIZED: &str = "Genie is not initialized";

/// Forwards questions to a [`DataService`] and normalizes the reply.
#[derive(Clone, Default)]
pub struct DataQueryBridge {
    service: Option<Arc<dyn DataService>>,
}

#[derive(Deserialize)]
struct Args {
    #[serde(alias = "questions")]
    question: String,
}

impl DataQueryBridge {
    /// Creates a bridge over `service`; `None` yields the not-initialized error.
    #[must_use]
    pub fn new(service: Option<Arc<dyn DataService>>) -> Self {
        Self { service }
    }

    /// Whether a data service is attached.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.service.is_some()
    }

    /// Asks the data service and returns a JSON-encoded record.
    pub async fn ask_data_service(&self, question: &str) -> String {
        let Some(service) = self.service.as_ref() else {
            return error_json(NOT_INITIALIZED);
        };

        match service.ask_question(question).await {
            Ok(response) => {
                debug!(query_len = response.query.len(), "data service answered");
                json!({
                    "query": response.query,
                    "result": response.result,
                    "description": response.description,
                })
                .to_string()
            }
            Err(e) => {
                warn!(error = %e, "data service call failed");
                error_json(&e.to_string())
            }
        }
    }
}

fn error_json(message: &str) -> String {
    json!({ "error": message }).to_string()
}

impl std::fmt::Debug for DataQueryBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataQueryBridge")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[async_trait]
impl ToolFunction for DataQueryBridge {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: "Ask Databricks Genie a natural-language question about the data in \
                           the connected Genie space. Returns the generated SQL query, the \
                           result table, and a description."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The question to ask Genie, in plain language."
                    }
                },
                "required": ["question"],
                "additionalProperties": false
            }),
        }
    }

    async fn call(&self, arguments: &str) -> String {
        let args: Args = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => return error_json(&format!("invalid arguments: {e}")),
        };
        if args.question.trim().is_empty() {
            return error_json("question must not be empty");
        }
        self.ask_data_service(&args.question).await
    }
}
