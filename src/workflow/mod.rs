//! Multi-agent workflow engine.
//!
//! A run takes the user's request through a team of simulated agents wired
//! up as a dependency graph. Each stage reports progress while it works, the
//! Coder stage performs the real generation call, and every transition is
//! mirrored into the chat transcript, the activity log, and the event
//! stream.
//!
//! ## Architecture
//!
//! The engine has four main components:
//!
//! 1. **Graph** - Validates the stage template (unique ids, known
//!    dependencies, no cycles)
//! 2. **Scheduler** - Tracks per-stage status, progress, and readiness
//! 3. **Runner** - Executes one dispatched stage and surfaces its chat and
//!    log texts
//! 4. **Orchestrator** - Drives whole runs, bounds parallelism, and
//!    publishes events
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use synapse::generate::ScriptedGenerator;
//! use synapse::stage::default_stages;
//! use synapse::workflow::{Orchestrator, WorkflowConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let generator = Arc::new(ScriptedGenerator::new());
//! let orchestrator =
//!     Orchestrator::new(default_stages(), generator, WorkflowConfig::default())?;
//!
//! let summary = orchestrator.run("build a todo app").await?;
//! println!("{} stages done, {} failed", summary.done, summary.failed);
//! # Ok(())
//! # }
//! ```

mod events;
mod graph;
mod orchestrator;
mod runner;
mod scheduler;
mod state;

pub use events::WorkflowEvent;
pub use graph::StageGraph;
pub use orchestrator::{Orchestrator, WorkflowConfig};
pub use scheduler::{StageNode, StageStatus, WorkflowScheduler};
pub use state::{RunInfo, RunSummary, StageView, WorkflowSnapshot, WorkflowState};
