//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::Parser;

/// Ask a Foundry agent questions answered from Databricks Genie.
///
/// With no question, starts an interactive session.
#[derive(Parser, Debug)]
#[command(name = "genie-agent")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"Examples:
  genie-agent                                    # Interactive session
  genie-agent What is the average tip on Friday? # Ask once and exit

Configuration is read from FOUNDRY_PROJECT_ENDPOINT,
FOUNDRY_DATABRICKS_CONNECTION_NAME, and FOUNDRY_AGENT_ID or
MODEL_DEPLOYMENT_NAME. Set RUST_LOG to see diagnostics on stderr.
"#)]
pub struct Cli {
    /// Question to ask; words are joined with spaces.
    #[arg(trailing_var_arg = true)]
    pub question: Vec<String>,
}

impl Cli {
    /// Returns the single-shot question, if any words were given.
    ///
    /// A blank argument still selects single-shot mode; the orchestrator
    /// rejects it and the session reports the error.
    #[must_use]
    pub fn question(&self) -> Option<String> {
        (!self.question.is_empty()).then(|| self.question.join(" "))
    }
}
