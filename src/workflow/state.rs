//! The explicit workflow state object and its serializable views.
//!
//! All mutation flows through the orchestrator's transition functions; every
//! observer (HTTP API, terminal UI, tests) reads the same state through
//! snapshots, and a snapshot round-trips through the store so a later
//! process can inspect or retry a finished run.

use crate::errors::StudioError;
use crate::generate::compute_prompt_hash;
use crate::stage::StageSpec;
use crate::transcript::{ActivityLog, ChatMessage, Transcript};
use crate::workflow::scheduler::{StageStatus, WorkflowScheduler};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standing first transcript entry, shown before any run has started.
const WELCOME_MESSAGE: &str = "Welcome to **Agentic Studio**. I am your AI \
    project manager. Describe the app you want to build and I will engage my \
    team of AI agents to scaffold it for you.";

/// Metadata for one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub id: Uuid,
    pub prompt: String,
    pub prompt_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: Option<bool>,
}

/// One stage as surfaced to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub id: u32,
    pub name: String,
    pub status: StageStatus,
    pub progress: u8,
    pub dependencies: Vec<u32>,
}

/// Serializable snapshot of the whole workflow state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub run: Option<RunInfo>,
    pub stages: Vec<StageView>,
    pub transcript: Transcript,
    pub log: ActivityLog,
}

/// Summary handed back by `run` and `retry`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub success: bool,
    pub done: usize,
    pub failed: usize,
    pub blocked: usize,
    pub files_generated: usize,
    pub duration_ms: u64,
}

/// The single mutable state object behind the orchestrator.
#[derive(Debug)]
pub struct WorkflowState {
    pub scheduler: WorkflowScheduler,
    pub transcript: Transcript,
    pub log: ActivityLog,
    pub run: Option<RunInfo>,
}

impl WorkflowState {
    pub fn new(stages: Vec<StageSpec>) -> Result<Self, StudioError> {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::ai(WELCOME_MESSAGE));
        Ok(Self {
            scheduler: WorkflowScheduler::from_stages(stages)?,
            transcript,
            log: ActivityLog::new(),
            run: None,
        })
    }

    /// Start a fresh run: stages back to Idle/0, new run metadata.
    ///
    /// The transcript and activity log carry over; chat history survives
    /// across runs.
    pub fn begin_run(&mut self, prompt: &str) -> RunInfo {
        self.scheduler.reset();
        let info = RunInfo {
            id: Uuid::new_v4(),
            prompt: prompt.to_string(),
            prompt_hash: compute_prompt_hash(prompt),
            started_at: Utc::now(),
            finished_at: None,
            success: None,
        };
        self.run = Some(info.clone());
        info
    }

    pub fn finish_run(&mut self, success: bool) {
        if let Some(run) = &mut self.run {
            run.finished_at = Some(Utc::now());
            run.success = Some(success);
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            run: self.run.clone(),
            stages: self
                .scheduler
                .nodes()
                .iter()
                .map(|node| StageView {
                    id: node.spec.id,
                    name: node.spec.name.clone(),
                    status: node.status.clone(),
                    progress: node.progress,
                    dependencies: node.spec.dependencies.clone(),
                })
                .collect(),
            transcript: self.transcript.clone(),
            log: self.log.clone(),
        }
    }

    /// Rebuild state from a persisted snapshot over the given template.
    ///
    /// Statuses are matched by stage id; ids in the snapshot that are not in
    /// the template are dropped. A stage recorded as Working never finished,
    /// so it returns to Idle.
    pub fn restore(stages: Vec<StageSpec>, snapshot: WorkflowSnapshot) -> Result<Self, StudioError> {
        let mut state = Self::new(stages)?;
        for view in snapshot.stages {
            let (status, progress) = if view.status.is_working() {
                (StageStatus::Idle, 0)
            } else {
                (view.status, view.progress)
            };
            state.scheduler.restore_status(view.id, status, progress);
        }
        state.transcript = snapshot.transcript;
        state.log = snapshot.log;
        state.run = snapshot.run;
        Ok(state)
    }
}
