//! Hosted-agent conversation layer.
//!
//! # Architecture
//!
//! ```text
//! question → Orchestrator
//!   ├── connect (once): connection lookup → Genie bridge → agent
//!   ├── thread + user message
//!   ├── run_loop: poll run ──requires_action──▶ ToolExecutor ──▶ submit
//!   └── select_reply → Answer
//! ```

pub mod client;
pub mod config;
pub mod executor;
pub mod host;
pub mod message;
pub mod orchestrator;
pub mod providers;
pub mod run_loop;
pub mod tool;

#[cfg(test)]
pub mod testing;

pub use client::{create_host, create_orchestrator, http_client};
pub use config::{AgentConfig, ConnectionPolicy, ThreadMode};
pub use executor::ToolExecutor;
pub use host::AgentHost;
pub use message::{Role, Run, RunStatus, ThreadMessage};
pub use orchestrator::{Answer, ConnectReport, GenieStatus, Orchestrator};
pub use tool::{ToolCall, ToolDefinition, ToolFunction, ToolResult, ToolSet};
