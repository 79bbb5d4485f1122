//! Run inspection and state reset commands.

use anyhow::Result;
use std::path::Path;

use super::super::Cli;

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use synapse::config::Config;
    use synapse::store::keys;
    use synapse::workflow::WorkflowSnapshot;
    use synapse::workspace::WorkspaceState;

    let config = Config::new(project_dir.to_path_buf(), false, false, None)?;
    let store = config.store();

    println!();
    println!("Synapse Studio Status");
    println!("=====================");
    println!();

    let Some(snapshot) = store.get_json_opt::<WorkflowSnapshot>(keys::WORKFLOW) else {
        println!("No run recorded yet.");
        println!();
        println!("Run 'synapse run \"<prompt>\"' to start the agent team.");
        println!();
        return Ok(());
    };

    if let Some(run) = &snapshot.run {
        println!("Run:     {}", run.id);
        println!("Prompt:  \"{}\"", run.prompt);
        println!("Started: {}", run.started_at.format("%Y-%m-%d %H:%M:%S"));
        match (run.finished_at, run.success) {
            (Some(finished), Some(true)) => {
                println!("Result:  succeeded at {}", finished.format("%H:%M:%S"));
            }
            (Some(finished), Some(false)) => {
                println!("Result:  failed at {}", finished.format("%H:%M:%S"));
            }
            _ => println!("Result:  interrupted (never settled)"),
        }
    }

    if let Some(workspace) = store.get_json_opt::<WorkspaceState>(keys::CODE_FILES) {
        let editing = workspace
            .active_path()
            .map(|path| format!(", editing {}", path))
            .unwrap_or_default();
        println!("Files:   {}{}", workspace.file_count(), editing);
    }

    println!();
    println!("{:<4} {:<18} {:>8}  Status", "Id", "Agent", "Progress");
    for stage in &snapshot.stages {
        println!(
            "{:<4} {:<18} {:>7}%  {}",
            stage.id,
            stage.name,
            stage.progress,
            status_label(&stage.status)
        );
    }

    if !snapshot.log.is_empty() {
        println!();
        println!("Recent activity:");
        for entry in snapshot.log.entries().iter().rev().take(5) {
            println!(
                "  {} [{}] {}",
                entry.timestamp.format("%H:%M:%S"),
                entry.stage_name,
                entry.message
            );
        }
    }
    println!();
    Ok(())
}

pub fn cmd_reset(cli: &Cli, project_dir: &Path, force: bool) -> Result<()> {
    use dialoguer::Confirm;
    use synapse::config::Config;
    use synapse::store::keys;

    let config = Config::new(project_dir.to_path_buf(), cli.verbose, cli.yes, None)?;

    if !force && !cli.yes {
        let confirm = Confirm::new()
            .with_prompt("This will clear the saved workspace, run history, and settings. Are you sure?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    let store = config.store();
    for key in [
        keys::WORKFLOW,
        keys::CODE_FILES,
        keys::EDITOR_CODE,
        keys::SETTINGS,
    ] {
        store.remove(key)?;
    }

    if config.log_dir.exists() {
        std::fs::remove_dir_all(&config.log_dir).ok();
    }

    println!("Reset complete");
    Ok(())
}

/// One-line status display for a stage.
fn status_label(status: &synapse::workflow::StageStatus) -> String {
    use synapse::workflow::StageStatus;

    match status {
        StageStatus::Idle => "idle".to_string(),
        StageStatus::Working => "working".to_string(),
        StageStatus::Done => "done".to_string(),
        StageStatus::Failed { error } => format!("failed: {}", error),
        StageStatus::Blocked { waiting_on } => {
            let ids = waiting_on
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("blocked (waiting on {})", ids)
        }
    }
}
