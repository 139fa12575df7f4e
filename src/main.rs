//! genie-agent binary entry point.

use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;
use genie_agent::agent::config::{DEFAULT_UPSTREAM, DEFAULT_UPSTREAM_VERSION};
use genie_agent::cli::{Cli, LazyAsker, run_interactive, run_single};
use genie_agent::{AgentConfig, Error, create_orchestrator};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    set_upstream_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let result = runtime.block_on(run(cli));
    // A stdin read may still be parked on a blocking thread after an interrupt.
    runtime.shutdown_background();
    result
}

/// Tags Databricks traffic with the integration that originated it.
#[allow(unsafe_code)]
fn set_upstream_env() {
    for (key, value) in [
        ("DATABRICKS_SDK_UPSTREAM", DEFAULT_UPSTREAM),
        ("DATABRICKS_SDK_UPSTREAM_VERSION", DEFAULT_UPSTREAM_VERSION),
    ] {
        // SAFETY: called from `main` before the runtime or any other thread
        // is started.
        unsafe { std::env::set_var(key, value) };
    }
}

/// Question-level failures are printed and do not affect the exit status.
async fn run(cli: Cli) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut asker = LazyAsker::new(|| {
        let config = AgentConfig::from_env().map_err(Error::from)?;
        create_orchestrator(config)
    });
    let mut stdout = io::stdout().lock();

    if let Some(question) = cli.question() {
        let answered = run_single(&mut asker, &question, &mut stdout, &cancel).await?;
        stdout.flush()?;
        tracing::debug!(answered, "single question finished");
        return Ok(());
    }

    let label = std::env::var("FOUNDRY_AGENT_ID")
        .or_else(|_| std::env::var("MODEL_DEPLOYMENT_NAME").map(|m| format!("(new agent on {m})")))
        .unwrap_or_else(|_| "(not configured)".to_string());
    let stdin = BufReader::new(tokio::io::stdin());
    run_interactive(&mut asker, stdin, &mut stdout, &label, &cancel).await?;
    Ok(())
}
