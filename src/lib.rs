//! # genie-agent
//!
//! Ask a hosted Azure AI Foundry agent natural-language questions and let it
//! answer from Databricks through a Genie space.
//!
//! The agent host runs the conversation; when the agent needs data it calls
//! the `ask_genie` tool, which this crate executes locally against the Genie
//! REST API and submits back to the run.
//!
//! ## Modules
//!
//! - [`agent`]: host client, run loop, tool registry, orchestrator
//! - [`genie`]: Genie client and the data-query bridge tool
//! - [`credential`]: Entra ID token sources
//! - [`poll`]: bounded polling with an injectable sleeper
//! - [`cli`]: argument parsing and session drivers
//! - [`error`]: error types

pub mod agent;
pub mod cli;
pub mod credential;
pub mod error;
pub mod genie;
pub mod poll;

pub use agent::{AgentConfig, Answer, Orchestrator, create_orchestrator};
pub use error::{Error, Result};
pub use genie::DataQueryBridge;
