//! Run lifecycle and stage dispatch.
//!
//! The orchestrator owns the shared workflow state and drives runs end to
//! end: it opens the run (kickoff chat and log lines), dispatches ready
//! stages through a semaphore-bounded task pool, and settles the run once
//! every dispatched stage has finished. A failed stage blocks its dependents
//! and stops further dispatch; a manual retry picks the queue back up.

use crate::errors::StudioError;
use crate::generate::CodeGenerator;
use crate::stage::StageSpec;
use crate::store::{LocalStore, keys};
use crate::studio_config::SynapseToml;
use crate::transcript::{ChatMessage, ORCHESTRATOR};
use crate::workflow::events::WorkflowEvent;
use crate::workflow::runner::{StageContext, StageWork, run_stage};
use crate::workflow::state::{RunSummary, WorkflowState};
use crate::workspace::WorkspaceState;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore, broadcast, mpsc};
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const RESULT_CHANNEL_CAPACITY: usize = 32;

/// Tuning knobs for a run.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Maximum number of stages working at once.
    pub max_parallel: usize,
    /// Multiplier applied to simulated stage durations.
    pub time_scale: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            time_scale: 1.0,
        }
    }
}

impl WorkflowConfig {
    pub fn from_config(config: &SynapseToml) -> Self {
        Self {
            max_parallel: config.workflow.max_parallel,
            time_scale: config.workflow.time_scale,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }
}

/// Drives workflow runs over shared state.
pub struct Orchestrator {
    state: Arc<Mutex<WorkflowState>>,
    workspace: Arc<Mutex<WorkspaceState>>,
    generator: Arc<dyn CodeGenerator>,
    events: broadcast::Sender<WorkflowEvent>,
    config: WorkflowConfig,
    store: Option<Arc<LocalStore>>,
    running: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Build an orchestrator over a fresh scaffold workspace.
    pub fn new(
        stages: Vec<StageSpec>,
        generator: Arc<dyn CodeGenerator>,
        config: WorkflowConfig,
    ) -> Result<Self, StudioError> {
        Ok(Self::from_parts(
            WorkflowState::new(stages)?,
            WorkspaceState::scaffold(),
            generator,
            config,
        ))
    }

    /// Build an orchestrator over already-loaded state, e.g. restored from
    /// a persisted snapshot.
    pub fn from_parts(
        state: WorkflowState,
        workspace: WorkspaceState,
        generator: Arc<dyn CodeGenerator>,
        config: WorkflowConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(state)),
            workspace: Arc::new(Mutex::new(workspace)),
            generator,
            events,
            config,
            store: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Persist snapshots to the given store when runs settle.
    pub fn with_store(mut self, store: Arc<LocalStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> Arc<Mutex<WorkflowState>> {
        self.state.clone()
    }

    pub fn workspace(&self) -> Arc<Mutex<WorkspaceState>> {
        self.workspace.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the whole workflow for a user request.
    ///
    /// Fails with `RunInProgress` if another run is active on this
    /// orchestrator.
    pub async fn run(&self, prompt: &str) -> Result<RunSummary, StudioError> {
        let _guard = RunGuard::acquire(&self.running)?;
        let started = Instant::now();
        let run_id = self.open_run(prompt).await;
        tracing::info!(%run_id, "workflow run started");
        self.settle(run_id, started).await
    }

    /// Open a run and settle it on a background task.
    ///
    /// Returns the run id as soon as the run is opened; progress is
    /// observable through the event stream and the shared state.
    pub async fn spawn_run(self: &Arc<Self>, prompt: &str) -> Result<Uuid, StudioError> {
        let guard = RunGuard::acquire(&self.running)?;
        let started = Instant::now();
        let run_id = self.open_run(prompt).await;
        tracing::info!(%run_id, "workflow run started in background");

        let orchestrator = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match orchestrator.settle(run_id, started).await {
                Ok(summary) => {
                    tracing::info!(%run_id, success = summary.success, "background run settled");
                }
                Err(error) => tracing::error!(%run_id, %error, "background run failed"),
            }
        });
        Ok(run_id)
    }

    /// Re-run a failed stage and everything it was blocking.
    pub async fn retry(&self, stage_id: u32) -> Result<RunSummary, StudioError> {
        let _guard = RunGuard::acquire(&self.running)?;
        let started = Instant::now();
        let run_id = self.open_retry(stage_id).await?;
        tracing::info!(stage_id, "retrying failed stage");
        self.settle(run_id, started).await
    }

    /// Open a retry and settle it on a background task.
    ///
    /// Eligibility is checked before spawning, so callers get the
    /// `UnknownStage`/`NotRetryable` errors synchronously.
    pub async fn spawn_retry(self: &Arc<Self>, stage_id: u32) -> Result<Uuid, StudioError> {
        let guard = RunGuard::acquire(&self.running)?;
        let started = Instant::now();
        let run_id = self.open_retry(stage_id).await?;
        tracing::info!(stage_id, "retrying failed stage in background");

        let orchestrator = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match orchestrator.settle(run_id, started).await {
                Ok(summary) => {
                    tracing::info!(%run_id, success = summary.success, "background retry settled");
                }
                Err(error) => tracing::error!(%run_id, %error, "background retry failed"),
            }
        });
        Ok(run_id)
    }

    /// Record run metadata and surface the kickoff transcript texts.
    async fn open_run(&self, prompt: &str) -> Uuid {
        let mut state = self.state.lock().await;
        let info = state.begin_run(prompt);

        let user = ChatMessage::user(prompt);
        state.transcript.push(user.clone());
        self.emit(WorkflowEvent::Chat { message: user });

        let kickoff = ChatMessage::ai(format!(
            "Okay, I will scaffold an application based on your request: \
             \"{prompt}\". I am engaging my team of AI agents to fulfill \
             your request."
        ));
        state.transcript.push(kickoff.clone());
        self.emit(WorkflowEvent::Chat { message: kickoff });

        let entry = state.log.log(
            ORCHESTRATOR,
            format!("User request received: '{prompt}'. Engaging agent team."),
        );
        self.emit(WorkflowEvent::Log { entry });
        self.emit(WorkflowEvent::RunStarted {
            run_id: info.id,
            prompt: prompt.to_string(),
        });
        info.id
    }

    /// Check retry eligibility and reset the failed stage to Idle.
    async fn open_retry(&self, stage_id: u32) -> Result<Uuid, StudioError> {
        let mut state = self.state.lock().await;
        let node = state
            .scheduler
            .node(stage_id)
            .ok_or(StudioError::UnknownStage(stage_id))?;
        if !node.status.is_failed() {
            return Err(StudioError::NotRetryable {
                id: stage_id,
                name: node.spec.name.clone(),
            });
        }
        let name = node.spec.name.clone();
        let run_id = state
            .run
            .as_ref()
            .map(|run| run.id)
            .ok_or(StudioError::NoRunRecorded)?;

        state.scheduler.reset_stage(stage_id);
        let entry = state
            .log
            .log(ORCHESTRATOR, format!("Retrying stage: {name}."));
        self.emit(WorkflowEvent::Log { entry });
        Ok(run_id)
    }

    async fn settle(&self, run_id: Uuid, started: Instant) -> Result<RunSummary, StudioError> {
        self.drive().await?;
        self.finish(run_id, started).await
    }

    /// Dispatch ready stages until nothing is ready and nothing is in
    /// flight. Once any stage fails, no new stage is dispatched; work
    /// already in flight drains before the run settles.
    async fn drive(&self) -> Result<(), StudioError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        let (result_tx, mut result_rx) = mpsc::channel::<(u32, bool)>(RESULT_CHANNEL_CAPACITY);
        let mut in_flight: HashSet<u32> = HashSet::new();
        let mut halted = false;

        loop {
            if !halted {
                let ready = {
                    let state = self.state.lock().await;
                    state.scheduler.ready_stages()
                };

                for id in ready {
                    if in_flight.contains(&id) {
                        continue;
                    }
                    let work = self.work_for(id).await?;
                    let ctx = StageContext {
                        state: self.state.clone(),
                        workspace: self.workspace.clone(),
                        events: self.events.clone(),
                    };
                    let semaphore = semaphore.clone();
                    let result_tx = result_tx.clone();
                    in_flight.insert(id);

                    tokio::spawn(async move {
                        let Ok(_permit) = semaphore.acquire_owned().await else {
                            return;
                        };
                        let ok = run_stage(&ctx, id, work).await;
                        let _ = result_tx.send((id, ok)).await;
                    });
                }
            }

            if in_flight.is_empty() {
                break;
            }

            match result_rx.recv().await {
                Some((id, ok)) => {
                    in_flight.remove(&id);
                    if !ok {
                        halted = true;
                    }
                }
                None => break,
            }
        }

        Ok(())
    }

    async fn work_for(&self, id: u32) -> Result<StageWork, StudioError> {
        let state = self.state.lock().await;
        let node = state
            .scheduler
            .node(id)
            .ok_or(StudioError::UnknownStage(id))?;

        if node.spec.is_generator() {
            let prompt = state
                .run
                .as_ref()
                .map(|run| run.prompt.clone())
                .unwrap_or_default();
            Ok(StageWork::Generate {
                generator: self.generator.clone(),
                prompt,
            })
        } else {
            Ok(StageWork::Simulated {
                duration: node.spec.duration().mul_f64(self.config.time_scale),
            })
        }
    }

    /// Close out a settled run: final log line, terminal event, snapshot
    /// persistence, summary.
    async fn finish(&self, run_id: Uuid, started: Instant) -> Result<RunSummary, StudioError> {
        let mut state = self.state.lock().await;
        let success = state.scheduler.all_done();
        state.finish_run(success);

        if success {
            let entry = state
                .log
                .log(ORCHESTRATOR, "Workflow complete. All agents finished.");
            self.emit(WorkflowEvent::Log { entry });
        }
        self.emit(WorkflowEvent::RunFinished { run_id, success });

        let workspace = self.workspace.lock().await;
        let generator_done = state
            .scheduler
            .nodes()
            .iter()
            .any(|node| node.spec.is_generator() && node.status.is_done());
        let files_generated = if generator_done {
            workspace.file_count()
        } else {
            0
        };

        if let Some(store) = &self.store {
            if let Err(error) = store.put_json(keys::WORKFLOW, &state.snapshot()) {
                tracing::warn!(%error, "failed to persist workflow snapshot");
            }
            if let Err(error) = store.put_json(keys::CODE_FILES, &*workspace) {
                tracing::warn!(%error, "failed to persist workspace");
            }
        }

        let summary = RunSummary {
            run_id,
            success,
            done: state.scheduler.done_count(),
            failed: state.scheduler.failed_count(),
            blocked: state.scheduler.blocked_count(),
            files_generated,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(%run_id, success, "workflow run finished");
        Ok(summary)
    }

    fn emit(&self, event: WorkflowEvent) {
        let _ = self.events.send(event);
    }
}

/// Clears the running flag when a run settles, including on early error
/// returns.
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, StudioError> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StudioError::RunInProgress);
        }
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
