//! Tool type definitions for function-calling.
//!
//! Provides the tool registry handed to the agent host: each entry pairs a
//! definition (name, description, JSON Schema parameters) with the local
//! function that answers calls to it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tool definition that can be sent to the agent host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireDefinition", into = "WireDefinition")]
pub struct ToolDefinition {
    /// Tool name (must match the registered function).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the agent during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireCall", into = "WireCall")]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the host).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content (always a JSON string).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

/// A local function the agent may call.
///
/// Implementations must always produce a JSON string, reporting failures
/// in-band rather than erroring, so the run can always be resumed.
#[async_trait]
pub trait ToolFunction: Send + Sync {
    /// Definition advertised to the agent host.
    fn definition(&self) -> ToolDefinition;

    /// Answers one call with JSON-encoded `arguments`.
    async fn call(&self, arguments: &str) -> String;
}

/// The set of tools available to the agent for a session.
#[derive(Clone, Default)]
pub struct ToolSet {
    functions: BTreeMap<String, Arc<dyn ToolFunction>>,
}

impl ToolSet {
    /// Empty tool set (no tools available).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Registers a function under the name from its definition.
    #[must_use]
    pub fn with_function(mut self, function: Arc<dyn ToolFunction>) -> Self {
        self.functions
            .insert(function.definition().name, function);
        self
    }

    /// Returns the tool definitions in this set, ordered by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.functions.values().map(|f| f.definition()).collect()
    }

    /// Looks up a registered function.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolFunction>> {
        self.functions.get(name)
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    parameters: serde_json::Value,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    arguments: String,
}

#[derive(Serialize, Deserialize)]
struct WireDefinition {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

impl From<WireDefinition> for ToolDefinition {
    fn from(wire: WireDefinition) -> Self {
        Self {
            name: wire.function.name,
            description: wire.function.description,
            parameters: wire.function.parameters,
        }
    }
}

impl From<ToolDefinition> for WireDefinition {
    fn from(def: ToolDefinition) -> Self {
        Self {
            kind: "function".to_string(),
            function: WireFunction {
                name: def.name,
                description: def.description,
                parameters: def.parameters,
                arguments: String::new(),
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

fn function_kind() -> String {
    "function".to_string()
}

impl From<WireCall> for ToolCall {
    fn from(wire: WireCall) -> Self {
        Self {
            id: wire.id,
            name: wire.function.name,
            arguments: wire.function.arguments,
        }
    }
}

impl From<ToolCall> for WireCall {
    fn from(call: ToolCall) -> Self {
        Self {
            id: call.id,
            kind: function_kind(),
            function: WireFunction {
                name: call.name,
                description: String::new(),
                parameters: serde_json::Value::Null,
                arguments: call.arguments,
            },
        }
    }
}
