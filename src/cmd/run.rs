//! Workflow execution commands: `synapse run` and `synapse retry`.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use synapse::config::Config;
use synapse::errors::StudioError;
use synapse::generate::CodeGenerator;
use synapse::stage::StageSpec;
use synapse::ui::{UiMode, WorkflowUI};
use synapse::workflow::{Orchestrator, RunSummary, WorkflowConfig, WorkflowEvent};

use super::super::Cli;

pub async fn cmd_run(
    cli: &Cli,
    project_dir: PathBuf,
    prompt: Option<String>,
    offline: bool,
    ui_mode: &str,
) -> Result<()> {
    let config = Config::new(project_dir, cli.verbose, cli.yes, cli.max_parallel)?;
    config.ensure_directories()?;

    let prompt = resolve_prompt(prompt)?;
    let stages = config.load_stages()?;
    let orchestrator = build_orchestrator(&config, stages.clone(), offline)?;
    let ui = Arc::new(WorkflowUI::new(&stages, UiMode::parse(ui_mode), cli.verbose));

    let mut summary = attend(&orchestrator, &ui, orchestrator.run(&prompt)).await?;

    // Offer to re-run the failed stage until the run succeeds or the user
    // declines. Skipped with --yes and when stdin is not a terminal.
    while !summary.success {
        let Some((stage_id, stage_name)) = first_failed_stage(&orchestrator).await else {
            break;
        };
        if cli.yes || !console::user_attended() {
            break;
        }
        let retry = dialoguer::Confirm::new()
            .with_prompt(format!("{} failed. Retry it now?", stage_name))
            .default(true)
            .interact()
            .unwrap_or(false);
        if !retry {
            break;
        }
        // Finished bars cannot be reused, so each attempt renders fresh ones.
        let ui = Arc::new(WorkflowUI::new(&stages, UiMode::parse(ui_mode), cli.verbose));
        summary = attend(&orchestrator, &ui, orchestrator.retry(stage_id)).await?;
    }

    report_outcome(&summary, &orchestrator).await;
    Ok(())
}

pub async fn cmd_retry(
    cli: &Cli,
    project_dir: PathBuf,
    stage_id: u32,
    offline: bool,
    ui_mode: &str,
) -> Result<()> {
    let config = Config::new(project_dir, cli.verbose, cli.yes, cli.max_parallel)?;
    config.ensure_directories()?;

    let stages = config.load_stages()?;
    let orchestrator = build_orchestrator(&config, stages.clone(), offline)?;
    let ui = Arc::new(WorkflowUI::new(&stages, UiMode::parse(ui_mode), cli.verbose));

    let summary = attend(&orchestrator, &ui, orchestrator.retry(stage_id)).await?;
    report_outcome(&summary, &orchestrator).await;
    Ok(())
}

/// Build an orchestrator wired to the project store, restoring the last
/// persisted run and workspace when present.
pub(crate) fn build_orchestrator(
    config: &Config,
    stages: Vec<StageSpec>,
    offline: bool,
) -> Result<Arc<Orchestrator>> {
    use synapse::store::keys;
    use synapse::workflow::{WorkflowSnapshot, WorkflowState};
    use synapse::workspace::WorkspaceState;

    let generator = build_generator(config, offline);
    let workflow_config = WorkflowConfig::default()
        .with_max_parallel(config.max_parallel)
        .with_time_scale(config.time_scale);

    let store = Arc::new(config.store());
    let state = match store.get_json_opt::<WorkflowSnapshot>(keys::WORKFLOW) {
        Some(snapshot) => WorkflowState::restore(stages, snapshot)?,
        None => WorkflowState::new(stages)?,
    };
    let workspace = store
        .get_json_opt::<WorkspaceState>(keys::CODE_FILES)
        .unwrap_or_else(WorkspaceState::scaffold);

    Ok(Arc::new(
        Orchestrator::from_parts(state, workspace, generator, workflow_config).with_store(store),
    ))
}

/// Pick the generation backend: the real `claude` CLI, or the scripted
/// sample app when offline mode is requested.
pub(crate) fn build_generator(config: &Config, offline: bool) -> Arc<dyn CodeGenerator> {
    use synapse::generate::{ClaudeCliGenerator, ScriptedGenerator};

    if offline || config.offline {
        Arc::new(ScriptedGenerator::with_output(sample_app_files()))
    } else {
        Arc::new(ClaudeCliGenerator::new(
            config.claude_cmd.clone(),
            config.project_dir.clone(),
        ))
    }
}

/// Run one workflow operation while forwarding its events to the UI.
///
/// The subscription is opened before the operation is polled, so the UI sees
/// every event from `run_started` through `run_finished`.
async fn attend<F>(
    orchestrator: &Arc<Orchestrator>,
    ui: &Arc<WorkflowUI>,
    op: F,
) -> Result<RunSummary, StudioError>
where
    F: Future<Output = Result<RunSummary, StudioError>>,
{
    use tokio::sync::broadcast::error::RecvError;

    let mut events = orchestrator.subscribe();
    let ui = ui.clone();
    let consumer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let finished = matches!(event, WorkflowEvent::RunFinished { .. });
                    ui.handle_event(&event);
                    if finished {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = op.await;
    if result.is_err() {
        // The run never opened, so no run_finished event is coming.
        consumer.abort();
    } else {
        consumer.await.ok();
    }
    result
}

async fn report_outcome(summary: &RunSummary, orchestrator: &Orchestrator) {
    println!();
    if summary.success {
        println!(
            "  {} {} stages done, {} files in the workspace ({} ms)",
            console::style("Run succeeded:").green().bold(),
            summary.done,
            summary.files_generated,
            summary.duration_ms
        );
        return;
    }

    println!(
        "  {} {} done, {} failed, {} blocked",
        console::style("Run failed:").red().bold(),
        summary.done,
        summary.failed,
        summary.blocked
    );
    for (id, name) in failed_stages(orchestrator).await {
        println!("  Failed: [{}] {}", id, name);
    }
    println!("  Tip: 'synapse retry <stage-id>' re-runs a failed stage and unblocks its dependents.");
    println!("  Tip: 'synapse status' shows the recorded run and recent activity.");
}

async fn first_failed_stage(orchestrator: &Orchestrator) -> Option<(u32, String)> {
    failed_stages(orchestrator).await.into_iter().next()
}

async fn failed_stages(orchestrator: &Orchestrator) -> Vec<(u32, String)> {
    let state = orchestrator.state();
    let state = state.lock().await;
    state
        .scheduler
        .nodes()
        .iter()
        .filter(|node| node.status.is_failed())
        .map(|node| (node.spec.id, node.spec.name.clone()))
        .collect()
}

fn resolve_prompt(prompt: Option<String>) -> Result<String> {
    let prompt = match prompt {
        Some(p) => p,
        None => dialoguer::Input::<String>::new()
            .with_prompt("What should the agents build?")
            .interact_text()?,
    };
    normalize_prompt(&prompt)
}

/// Trim the prompt and reject an empty one.
///
/// This is pure logic that can be unit-tested without terminal interaction.
fn normalize_prompt(prompt: &str) -> Result<String> {
    let prompt = prompt.trim();
    anyhow::ensure!(!prompt.is_empty(), "Prompt must not be empty");
    Ok(prompt.to_string())
}

/// The canned React app served by the offline generator.
pub(crate) fn sample_app_files() -> Vec<synapse::generate::GeneratedFile> {
    use synapse::generate::GeneratedFile;

    let package_json = r#"{ "name": "generated-app", "dependencies": { "react": "18.2.0", "react-dom": "18.2.0", "react-scripts": "5.0.1" }, "main": "/src/index.js" }"#;

    let index_js = r#"import React, { StrictMode } from "react";
import { createRoot } from "react-dom/client";
import App from "./App";

const root = createRoot(document.getElementById("root"));
root.render(
  <StrictMode>
    <App />
  </StrictMode>
);
"#;

    let app_jsx = r#"import React, { useState } from "react";

export default function App() {
  const [items, setItems] = useState([]);
  const [draft, setDraft] = useState("");

  const addItem = () => {
    if (!draft.trim()) return;
    setItems([...items, { id: Date.now(), text: draft.trim() }]);
    setDraft("");
  };

  return (
    <div style={{ fontFamily: "sans-serif", padding: 24 }}>
      <h1>Todo</h1>
      <input
        value={draft}
        onChange={(e) => setDraft(e.target.value)}
        onKeyDown={(e) => e.key === "Enter" && addItem()}
        placeholder="What needs doing?"
      />
      <button onClick={addItem}>Add</button>
      <ul>
        {items.map((item) => (
          <li key={item.id}>{item.text}</li>
        ))}
      </ul>
    </div>
  );
}
"#;

    let entries = [
        ("/package.json", package_json),
        ("/src/index.js", index_js),
        ("/src/App.jsx", app_jsx),
    ];
    entries
        .into_iter()
        .map(|(path, content)| GeneratedFile {
            path: path.to_string(),
            content: content.to_string(),
        })
        .collect()
}
