//! CLI layer for genie-agent.
//!
//! Argument parsing plus the single-shot and interactive session drivers.

pub mod parser;
pub mod session;

pub use parser::Cli;
pub use session::{Asker, Command, LazyAsker, run_interactive, run_single};
