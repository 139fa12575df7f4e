//! Run polling loop with tool-call interleaving.
//!
//! Drives a host run to a terminal status: waits while the run is queued or
//! in progress, answers every pending tool call when the run requires
//! action, and gives up once the poll budget is spent.

use tracing::{debug, warn};

use super::executor::ToolExecutor;
use super::host::AgentHost;
use super::message::{Run, RunStatus};
use crate::error::AgentError;
use crate::poll::{PollStrategy, Sleeper};

/// Drives `run` until it reaches a terminal status.
///
/// Each loop iteration counts against `strategy.max_attempts`, whether it
/// re-fetches the run or submits tool outputs. Tool outputs are submitted
/// without sleeping; every other non-terminal status waits for
/// `strategy.delay(attempt)` first.
///
/// # Errors
///
/// Returns [`AgentError::PollBudgetExhausted`] if the run is still active
/// after the budget, [`AgentError::UnsupportedAction`] if the host asks for
/// action without listing any tool calls (the run is cancelled first), and
/// propagates host errors.
pub async fn drive_run(
    host: &dyn AgentHost,
    executor: &ToolExecutor,
    sleeper: &dyn Sleeper,
    strategy: &PollStrategy,
    mut run: Run,
) -> Result<Run, AgentError> {
    for attempt in 0..strategy.max_attempts {
        if run.status.is_terminal() {
            debug!(run_id = run.id, status = %run.status, attempt, "run reached terminal status");
            return Ok(run);
        }

        if run.status == RunStatus::RequiresAction {
            let calls = run
                .required_action
                .as_ref()
                .map(|a| a.tool_calls().to_vec())
                .unwrap_or_default();

            if calls.is_empty() {
                warn!(run_id = run.id, "run requires action but lists no tool calls");
                host.cancel_run(&run.thread_id, &run.id).await?;
                return Err(AgentError::UnsupportedAction {
                    run_id: run.id,
                    message: "requires_action without tool calls".to_string(),
                });
            }

            debug!(run_id = run.id, tool_count = calls.len(), "executing tool calls");
            let outputs = executor.execute_all(&calls).await;
            run = host
                .submit_tool_outputs(&run.thread_id, &run.id, &outputs)
                .await?;
            continue;
        }

        sleeper.sleep(strategy.delay(attempt)).await;
        run = host.get_run(&run.thread_id, &run.id).await?;
    }

    if run.status.is_terminal() {
        return Ok(run);
    }

    Err(AgentError::PollBudgetExhausted {
        run_id: run.id,
        last_status: run.status.to_string(),
        attempts: strategy.max_attempts,
    })
}
