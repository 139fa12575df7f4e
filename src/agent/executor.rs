//! Tool executor that dispatches tool calls to registered functions.
//!
//! Every call yields a [`ToolResult`]; unknown tools and oversized argument
//! payloads become error-shaped JSON so the run can always be resumed.

use serde_json::json;
use tracing::{debug, warn};

use super::message::ToolOutput;
use super::tool::{ToolCall, ToolResult, ToolSet};

/// Maximum raw byte length of tool argument JSON from the agent.
const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// Dispatches tool calls against a [`ToolSet`].
#[derive(Debug, Clone, Default)]
pub struct ToolExecutor {
    tools: ToolSet,
}

impl ToolExecutor {
    /// Creates an executor over the given tools.
    #[must_use]
    pub const fn new(tools: ToolSet) -> Self {
        Self { tools }
    }

    /// The registered tools.
    #[must_use]
    pub const fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Dispatches a tool call to the matching function.
    ///
    /// Validates raw argument size before dispatch to prevent oversized payloads.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            warn!(tool = call.name, len = call.arguments.len(), "tool arguments too large");
            return error_result(
                call,
                &format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
            );
        }

        let Some(function) = self.tools.get(&call.name) else {
            warn!(tool = call.name, "agent requested an unregistered tool");
            return error_result(call, &format!("Tool '{}' is not registered", call.name));
        };

        let content = function.call(&call.arguments).await;
        let is_error = is_error_payload(&content);
        debug!(tool = call.name, call_id = call.id, is_error, "tool execution complete");

        ToolResult {
            tool_call_id: call.id.clone(),
            content,
            is_error,
        }
    }

    /// Executes every call in order and returns outputs ready to submit.
    ///
    /// Failed calls are logged and still submitted, so the agent sees the
    /// error payload and the run can continue.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            let result = self.execute(call).await;
            if result.is_error {
                warn!(
                    tool = call.name,
                    call_id = result.tool_call_id,
                    output = result.content,
                    "tool call failed"
                );
            }
            outputs.push(ToolOutput {
                tool_call_id: result.tool_call_id,
                output: result.content,
            });
        }
        outputs
    }
}

fn error_result(call: &ToolCall, message: &str) -> ToolResult {
    ToolResult {
        tool_call_id: call.id.clone(),
        content: json!({ "error": message }).to_string(),
        is_error: true,
    }
}

/// Whether `content` is a JSON object carrying an `error` key.
fn is_error_payload(content: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(content)
        .ok()
        .and_then(|v| v.as_object().map(|o| o.contains_key("error")))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tool::{ToolDefinition, ToolFunction};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Upper;

    #[async_trait]
    impl ToolFunction for Upper {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "upper".to_string(),
                description: "Uppercase".to_string(),
                parameters: json!({"type": "object"}),
            }
        }

        async fn call(&self, arguments: &str) -> String {
            json!({ "value": arguments.to_uppercase() }).to_string()
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn executor() -> ToolExecutor {
        ToolExecutor::new(ToolSet::none().with_function(Arc::new(Upper)))
    }

    #[tokio::test]
    async fn test_dispatches_to_registered_function() {
        let result = executor().execute(&call("upper", "abc")).await;
        assert_eq!(result.tool_call_id, "call_upper");
        assert_eq!(result.content, r#"{"value":"ABC"}"#);
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_json() {
        let result = executor().execute(&call("missing", "{}")).await;
        assert!(result.is_error);
        let value: serde_json::Value =
            serde_json::from_str(&result.content).unwrap_or_else(|_| unreachable!());
        assert_eq!(value["error"], "Tool 'missing' is not registered");
    }

    #[tokio::test]
    async fn test_oversized_arguments_rejected() {
        let big = "x".repeat(MAX_TOOL_ARGS_LEN + 1);
        let result = executor().execute(&call("upper", &big)).await;
        assert!(result.is_error);
        assert!(result.content.contains("too large"));
    }

    #[tokio::test]
    async fn test_execute_all_preserves_order() {
        let outputs = executor()
            .execute_all(&[call("upper", "a"), call("nope", "{}")])
            .await;
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].tool_call_id, "call_upper");
        assert_eq!(outputs[1].tool_call_id, "call_nope");
    }

    #[tokio::test]
    async fn test_execute_all_submits_failure_payload() {
        let outputs = executor().execute_all(&[call("nope", "{}")]).await;
        assert_eq!(outputs.len(), 1);
        assert!(is_error_payload(&outputs[0].output));
        assert!(outputs[0].output.contains("Tool 'nope' is not registered"));
    }

    #[test]
    fn test_is_error_payload() {
        assert!(is_error_payload(r#"{"error":"x"}"#));
        assert!(!is_error_payload(r#"{"query":"q"}"#));
        assert!(!is_error_payload("not json"));
    }
}
