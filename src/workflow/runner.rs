//! Single-stage execution: status transitions, progress reporting, and the
//! texts surfaced to the transcript and activity log.
//!
//! `run_stage` owns the full lifecycle of one dispatched stage. Simulated
//! stages report fixed progress ticks; the Coder stage reports milestones
//! around the real generation call and swaps the workspace on success.

use crate::errors::{GenerationError, StageError};
use crate::generate::CodeGenerator;
use crate::transcript::{ChatMessage, ORCHESTRATOR};
use crate::workflow::events::WorkflowEvent;
use crate::workflow::scheduler::StageStatus;
use crate::workflow::state::WorkflowState;
use crate::workspace::WorkspaceState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};

/// Number of progress reports a simulated stage makes.
const SIMULATED_TICKS: u32 = 10;
/// Progress step per tick.
const TICK_STEP: u8 = 10;
/// Ticks never reach completion; only a Done transition sets 100.
const TICK_CAP: u8 = 90;

/// The work a stage performs, resolved from its kind.
pub enum StageWork {
    /// Sleep-driven placeholder work reporting fixed progress ticks.
    Simulated { duration: Duration },
    /// Invoke the code generation client with the user's request.
    Generate {
        generator: Arc<dyn CodeGenerator>,
        prompt: String,
    },
}

/// Shared handles a running stage publishes its transitions through.
#[derive(Clone)]
pub(crate) struct StageContext {
    pub state: Arc<Mutex<WorkflowState>>,
    pub workspace: Arc<Mutex<WorkspaceState>>,
    pub events: broadcast::Sender<WorkflowEvent>,
}

impl StageContext {
    fn emit(&self, event: WorkflowEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

/// Run one stage to completion and report whether it succeeded.
///
/// Marks the stage Working, drives its work, then settles it to Done or
/// Failed. On failure every transitive dependent is blocked; on success any
/// directly dependent Blocked stage whose dependencies are all Done returns
/// to Idle.
pub(crate) async fn run_stage(ctx: &StageContext, id: u32, work: StageWork) -> bool {
    let name = {
        let mut state = ctx.state.lock().await;
        let Some(node) = state.scheduler.node(id) else {
            return false;
        };
        let name = node.spec.name.clone();
        state.scheduler.mark_working(id);
        let entry = state.log.log(&name, "Task started.");
        ctx.emit(WorkflowEvent::StageStarted {
            id,
            name: name.clone(),
        });
        ctx.emit(WorkflowEvent::Log { entry });
        name
    };

    tracing::info!(stage = %name, "stage started");

    let result = match work {
        StageWork::Simulated { duration } => simulate_work(ctx, id, duration).await,
        StageWork::Generate { generator, prompt } => {
            generate_work(ctx, id, &name, generator.as_ref(), &prompt).await
        }
    };

    match result {
        Ok(()) => {
            complete_stage(ctx, id, &name).await;
            true
        }
        Err(error) => {
            fail_stage(ctx, id, &name, &error).await;
            false
        }
    }
}

/// Placeholder work: sleep in fixed ticks and report progress after each.
async fn simulate_work(ctx: &StageContext, id: u32, duration: Duration) -> Result<(), StageError> {
    let tick = duration / SIMULATED_TICKS;
    for t in 1..=SIMULATED_TICKS {
        tokio::time::sleep(tick).await;
        let progress = (t as u8).saturating_mul(TICK_STEP).min(TICK_CAP);
        report_progress(ctx, id, progress).await;
    }
    Ok(())
}

/// Real work: call the generation client and swap the workspace on success.
async fn generate_work(
    ctx: &StageContext,
    id: u32,
    name: &str,
    generator: &dyn CodeGenerator,
    prompt: &str,
) -> Result<(), StageError> {
    {
        let mut state = ctx.state.lock().await;
        let entry = state.log.log(name, "Generating file structure and code...");
        ctx.emit(WorkflowEvent::Log { entry });
    }
    report_progress(ctx, id, 10).await;

    let output = generator.generate(prompt).await?;

    report_progress(ctx, id, 90).await;

    let entry_point = {
        let mut workspace = ctx.workspace.lock().await;
        workspace.apply_generation(&output)
    };
    ctx.emit(WorkflowEvent::FilesGenerated {
        count: output.code_files.len(),
        entry_point,
    });

    Ok(())
}

async fn report_progress(ctx: &StageContext, id: u32, progress: u8) {
    let mut state = ctx.state.lock().await;
    state.scheduler.set_progress(id, progress);
    ctx.emit(WorkflowEvent::StageProgress { id, progress });
}

async fn complete_stage(ctx: &StageContext, id: u32, name: &str) {
    let mut state = ctx.state.lock().await;

    let unblocked = state.scheduler.mark_done(id);
    let entry = state.log.log(name, "Task completed successfully.");
    ctx.emit(WorkflowEvent::StageCompleted {
        id,
        name: name.to_string(),
    });
    ctx.emit(WorkflowEvent::Log { entry });

    let handoff = state
        .scheduler
        .node(id)
        .map(|node| node.spec.handoff.clone())
        .unwrap_or_default();
    if !handoff.is_empty() {
        let message = ChatMessage::ai(handoff);
        state.transcript.push(message.clone());
        ctx.emit(WorkflowEvent::Chat { message });
    }

    for unblocked_id in unblocked {
        ctx.emit(WorkflowEvent::StageUnblocked { id: unblocked_id });
    }

    tracing::info!(stage = %name, "stage completed");
}

async fn fail_stage(ctx: &StageContext, id: u32, name: &str, error: &StageError) {
    let mut state = ctx.state.lock().await;

    let blocked = state.scheduler.mark_failed(id, &error.user_message());
    let entry = state.log.log(ORCHESTRATOR, failure_log_text(error));
    let message = ChatMessage::ai(failure_chat_text(error));
    state.transcript.push(message.clone());

    ctx.emit(WorkflowEvent::StageFailed {
        id,
        name: name.to_string(),
        error: error.user_message(),
    });
    ctx.emit(WorkflowEvent::Log { entry });
    ctx.emit(WorkflowEvent::Chat { message });

    for blocked_id in &blocked {
        if let Some(node) = state.scheduler.node(*blocked_id)
            && let StageStatus::Blocked { waiting_on } = &node.status
        {
            ctx.emit(WorkflowEvent::StageBlocked {
                id: *blocked_id,
                waiting_on: waiting_on.clone(),
            });
        }
    }

    tracing::warn!(stage = %name, error = %error, "stage failed");
}

/// Activity log line for a failed stage.
fn failure_log_text(error: &StageError) -> String {
    match error {
        StageError::Generation(GenerationError::Empty) => {
            "Error: AI generation failed. Missing file structure or code files.".to_string()
        }
        StageError::Generation(e) => format!("Error during generation: {e}"),
        other => format!("Error: {other}"),
    }
}

/// Chat transcript text for a failed stage.
fn failure_chat_text(error: &StageError) -> String {
    match error {
        StageError::Generation(GenerationError::Empty) => {
            "Sorry, an error occurred while building the application. \
             The AI agents failed to generate the necessary files."
                .to_string()
        }
        other => format!("An error occurred while building the application: {other}"),
    }
}
