//! Session drivers: ask once, or loop over questions read from a terminal.
//!
//! Output goes to a caller-supplied writer; diagnostics go through
//! `tracing`. Connecting is deferred to the first question so that a session
//! can be opened (and closed) without a reachable backend.

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::orchestrator::{Answer, ConnectReport, GenieStatus, Orchestrator};
use crate::error::Result;

const BANNER_RULE: &str = "============================================================";
const TURN_RULE: &str = "----------------------------------------";
const PROMPT: &str = "\nYour question: ";

/// Something that can answer questions.
#[async_trait]
pub trait Asker: Send {
    /// Connects if needed; returns a report on the first successful connect.
    async fn prepare(&mut self) -> Result<Option<ConnectReport>>;

    /// Answers one question.
    async fn ask(&mut self, question: &str) -> Result<Answer>;
}

#[async_trait]
impl Asker for Orchestrator {
    async fn prepare(&mut self) -> Result<Option<ConnectReport>> {
        self.ensure_connected().await
    }

    async fn ask(&mut self, question: &str) -> Result<Answer> {
        Orchestrator::ask(self, question).await
    }
}

/// Builds the orchestrator on first use.
///
/// A failed build is reported and retried on the next question.
pub struct LazyAsker<F> {
    build: F,
    inner: Option<Orchestrator>,
}

impl<F> LazyAsker<F>
where
    F: FnMut() -> Result<Orchestrator> + Send,
{
    /// Creates an asker that calls `build` when the first question arrives.
    pub const fn new(build: F) -> Self {
        Self { build, inner: None }
    }

    fn orchestrator(&mut self) -> Result<&mut Orchestrator> {
        let orchestrator = match self.inner.take() {
            Some(orchestrator) => orchestrator,
            None => (self.build)()?,
        };
        Ok(self.inner.insert(orchestrator))
    }
}

#[async_trait]
impl<F> Asker for LazyAsker<F>
where
    F: FnMut() -> Result<Orchestrator> + Send,
{
    async fn prepare(&mut self) -> Result<Option<ConnectReport>> {
        self.orchestrator()?.ensure_connected().await
    }

    async fn ask(&mut self, question: &str) -> Result<Answer> {
        self.orchestrator()?.ask(question).await
    }
}

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// End the session.
    Quit,
    /// Nothing was typed.
    Empty,
    /// A question to ask.
    Question(String),
}

impl Command {
    /// Classifies a raw input line.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        if ["quit", "exit", "q"]
            .iter()
            .any(|word| trimmed.eq_ignore_ascii_case(word))
        {
            return Self::Quit;
        }
        Self::Question(trimmed.to_string())
    }
}

fn write_connect_report<W: Write>(out: &mut W, report: &ConnectReport) -> std::io::Result<()> {
    match &report.genie {
        GenieStatus::Enabled => writeln!(out, "Genie functionality enabled for this session")?,
        GenieStatus::Disabled { reason } => {
            writeln!(out, "Could not enable Genie functionality: {reason}")?;
            writeln!(out, "The agent will work without Genie functions")?;
        }
    }
    writeln!(out, "Connected to agent: {}", report.agent_name)
}

/// Sends one question and prints the outcome. Returns whether a reply
/// was printed.
async fn ask_and_print<W: Write>(
    asker: &mut dyn Asker,
    question: &str,
    out: &mut W,
) -> std::io::Result<bool> {
    match asker.prepare().await {
        Ok(Some(report)) => write_connect_report(out, &report)?,
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "connect failed");
            writeln!(out, "Error communicating with agent: {e}")?;
            return Ok(false);
        }
    }

    writeln!(out, "Question sent: {question}")?;
    writeln!(out, "Processing...")?;
    out.flush()?;

    match asker.ask(question).await {
        Ok(Answer::Reply(text)) => {
            writeln!(out, "Response received:")?;
            writeln!(out, "Agent: {text}")?;
            Ok(true)
        }
        Ok(other) => {
            writeln!(out, "{other}")?;
            Ok(false)
        }
        Err(e) => {
            warn!(error = %e, "question failed");
            writeln!(out, "Error communicating with agent: {e}")?;
            Ok(false)
        }
    }
}

/// Asks a single question. Returns whether a reply was printed.
///
/// # Errors
///
/// Returns an error only if writing to `out` fails.
pub async fn run_single<W: Write>(
    asker: &mut dyn Asker,
    question: &str,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<bool> {
    writeln!(out, "Asking agent: {question}")?;
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            info!("interrupted");
            writeln!(out, "\nGoodbye!")?;
            Ok(false)
        }
        answered = ask_and_print(asker, question, out) => Ok(answered?),
    }
}

/// Runs the interactive loop until quit, end of input, or cancellation.
///
/// `agent_label` identifies the configured agent in the banner.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails.
pub async fn run_interactive<R, W>(
    asker: &mut dyn Asker,
    input: R,
    out: &mut W,
    agent_label: &str,
    cancel: &CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "{BANNER_RULE}")?;
    writeln!(out, "Interactive Agent Chat")?;
    writeln!(out, "Connected to Agent ID: {agent_label}")?;
    writeln!(out, "Type 'quit' or 'exit' to end the session")?;
    writeln!(out, "{BANNER_RULE}")?;

    let mut lines = input.lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let line = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                writeln!(out, "\nGoodbye!")?;
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("end of input");
            writeln!(out, "\nGoodbye!")?;
            break;
        };

        match Command::parse(&line) {
            Command::Quit => {
                writeln!(out, "Goodbye!")?;
                break;
            }
            Command::Empty => writeln!(out, "Please enter a question.")?,
            Command::Question(question) => {
                writeln!(out, "{TURN_RULE}")?;
                let interrupted = tokio::select! {
                    biased;
                    () = cancel.cancelled() => true,
                    result = ask_and_print(asker, &question, out) => {
                        if let Err(e) = result {
                            writeln!(out, "Error: {e}")?;
                        }
                        false
                    }
                };
                if interrupted {
                    info!("interrupted while a question was in flight");
                    writeln!(out, "\nGoodbye!")?;
                    break;
                }
                writeln!(out, "{TURN_RULE}")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
