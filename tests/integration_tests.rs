//! Integration tests for Synapse Studio
//!
//! These tests drive the real binary end to end: offline workflow runs,
//! cross-process retry, persisted state, and configuration handling.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a synapse Command
fn synapse() -> Command {
    cargo_bin_cmd!("synapse")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Write a synapse.toml that shrinks simulated stage durations so offline
/// runs settle in milliseconds.
fn write_fast_config(dir: &TempDir, extra: &str) {
    let synapse_dir = dir.path().join(".synapse");
    fs::create_dir_all(&synapse_dir).unwrap();
    let content = format!("[workflow]\ntime_scale = 0.01\n{}", extra);
    fs::write(synapse_dir.join("synapse.toml"), content).unwrap();
}

fn store_file(dir: &TempDir, key: &str) -> std::path::PathBuf {
    dir.path().join(".synapse/store").join(format!("{}.json", key))
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_synapse_help() {
        synapse().arg("--help").assert().success();
    }

    #[test]
    fn test_synapse_version() {
        synapse().arg("--version").assert().success();
    }

    #[test]
    fn test_status_on_fresh_project() {
        let dir = create_temp_project();

        synapse()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No run recorded yet"));
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();

        synapse()
            .current_dir(dir.path())
            .arg("config")
            .arg("show")
            .assert()
            .success()
            .stdout(predicate::str::contains("No synapse.toml found"))
            .stdout(predicate::str::contains("max_parallel = 1"))
            .stdout(predicate::str::contains("port = 9002"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = create_temp_project();

        synapse()
            .current_dir(dir.path())
            .arg("config")
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Created synapse.toml"));

        assert!(dir.path().join(".synapse/synapse.toml").exists());

        // A second init refuses to overwrite.
        synapse()
            .current_dir(dir.path())
            .arg("config")
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_no_config() {
        let dir = create_temp_project();

        synapse()
            .current_dir(dir.path())
            .arg("config")
            .arg("validate")
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults (valid)"));
    }

    #[test]
    fn test_config_validate_flags_bad_values() {
        let dir = create_temp_project();
        let synapse_dir = dir.path().join(".synapse");
        fs::create_dir_all(&synapse_dir).unwrap();
        fs::write(
            synapse_dir.join("synapse.toml"),
            r#"
[workflow]
max_parallel = 0
time_scale = -1.0

[server]
port = 0
"#,
        )
        .unwrap();

        synapse()
            .current_dir(dir.path())
            .arg("config")
            .arg("validate")
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings"))
            .stdout(predicate::str::contains("max_parallel"))
            .stdout(predicate::str::contains("time_scale"))
            .stdout(predicate::str::contains("port"));
    }

    #[test]
    fn test_config_shows_toml_content() {
        let dir = create_temp_project();
        let synapse_dir = dir.path().join(".synapse");
        fs::create_dir_all(&synapse_dir).unwrap();
        fs::write(
            synapse_dir.join("synapse.toml"),
            r#"
[project]
name = "my-studio"

[workflow]
max_parallel = 2

[server]
port = 9100
"#,
        )
        .unwrap();

        synapse()
            .current_dir(dir.path())
            .arg("config")
            .arg("show")
            .assert()
            .success()
            .stdout(predicate::str::contains("my-studio"))
            .stdout(predicate::str::contains("max_parallel = 2"))
            .stdout(predicate::str::contains("port = 9100"));
    }
}

// =============================================================================
// Workflow Run Tests
// =============================================================================

mod workflow_runs {
    use super::*;

    #[test]
    fn test_offline_run_succeeds_end_to_end() {
        let dir = create_temp_project();
        write_fast_config(&dir, "");

        synapse()
            .current_dir(dir.path())
            .arg("--yes")
            .arg("run")
            .arg("build a todo app")
            .arg("--offline")
            .arg("--ui")
            .arg("minimal")
            .assert()
            .success()
            .stdout(predicate::str::contains("Planner Agent"))
            .stdout(predicate::str::contains("Deployer Agent"))
            .stdout(predicate::str::contains("3 files generated"))
            .stdout(predicate::str::contains("Run succeeded:"));

        // The settled run is persisted for later status/retry invocations.
        assert!(store_file(&dir, "synapse-workflow").exists());
        assert!(store_file(&dir, "synapse-code-files").exists());

        synapse()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("build a todo app"))
            .stdout(predicate::str::contains("succeeded at"))
            .stdout(predicate::str::contains("Coder Agent"))
            .stdout(predicate::str::contains("done"))
            .stdout(predicate::str::contains("Workflow complete. All agents finished."));
    }

    #[test]
    fn test_run_events_stream_as_json() {
        let dir = create_temp_project();
        write_fast_config(&dir, "");

        synapse()
            .current_dir(dir.path())
            .arg("--yes")
            .arg("run")
            .arg("build a notes app")
            .arg("--offline")
            .arg("--ui")
            .arg("json")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"type\":\"run_started\""))
            .stdout(predicate::str::contains(
                "Okay, I will scaffold an application based on your request",
            ))
            .stdout(predicate::str::contains("\"type\":\"stage_completed\""))
            .stdout(predicate::str::contains("\"type\":\"files_generated\""))
            .stdout(predicate::str::contains("\"type\":\"run_finished\""))
            .stdout(predicate::str::contains("\"success\":true"));
    }

    #[test]
    fn test_failed_generation_blocks_then_retry_unblocks() {
        let dir = create_temp_project();
        // `false` exits non-zero, so the Coder stage fails.
        write_fast_config(&dir, "\n[generation]\nclaude_cmd = \"false\"\n");

        synapse()
            .current_dir(dir.path())
            .arg("--yes")
            .arg("run")
            .arg("build a todo app")
            .arg("--ui")
            .arg("minimal")
            .assert()
            .success()
            .stdout(predicate::str::contains("Run failed:"))
            .stdout(predicate::str::contains("Coder Agent"));

        synapse()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("failed:"))
            .stdout(predicate::str::contains("blocked (waiting on 3)"));

        // Retrying the failed stage in a fresh process picks up the
        // persisted run and settles it with the offline generator.
        synapse()
            .current_dir(dir.path())
            .arg("--yes")
            .arg("retry")
            .arg("3")
            .arg("--offline")
            .arg("--ui")
            .arg("minimal")
            .assert()
            .success()
            .stdout(predicate::str::contains("Run succeeded:"));

        synapse()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("succeeded at"));
    }

    #[test]
    fn test_retry_unknown_stage_fails() {
        let dir = create_temp_project();
        write_fast_config(&dir, "");

        synapse()
            .current_dir(dir.path())
            .arg("--yes")
            .arg("retry")
            .arg("42")
            .arg("--offline")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown stage id: 42"));
    }

    #[test]
    fn test_retry_without_recorded_run_fails() {
        let dir = create_temp_project();
        write_fast_config(&dir, "");

        synapse()
            .current_dir(dir.path())
            .arg("--yes")
            .arg("retry")
            .arg("3")
            .arg("--offline")
            .assert()
            .failure()
            .stderr(predicate::str::contains("not failed"));
    }

    #[test]
    fn test_run_rejects_empty_prompt() {
        let dir = create_temp_project();

        synapse()
            .current_dir(dir.path())
            .arg("--yes")
            .arg("run")
            .arg("   ")
            .arg("--offline")
            .assert()
            .failure()
            .stderr(predicate::str::contains("must not be empty"));
    }

    #[test]
    fn test_custom_stage_template_is_used() {
        let dir = create_temp_project();
        write_fast_config(&dir, "\n# stages_file points at the template below\nstages_file = \"stages.json\"\n");

        let stages = r#"{
  "version": 1,
  "stages": [
    { "id": 1, "name": "Solo Agent", "kind": "coding", "dependencies": [], "duration_ms": 100, "handoff": "" }
  ]
}"#;
        fs::write(dir.path().join("stages.json"), stages).unwrap();

        synapse()
            .current_dir(dir.path())
            .arg("--yes")
            .arg("run")
            .arg("build a tiny app")
            .arg("--offline")
            .arg("--ui")
            .arg("minimal")
            .assert()
            .success()
            .stdout(predicate::str::contains("Solo Agent"))
            .stdout(predicate::str::contains("Run succeeded:"));
    }
}

// =============================================================================
// Reset Tests
// =============================================================================

mod reset {
    use super::*;

    #[test]
    fn test_reset_with_force_clears_store() {
        let dir = create_temp_project();
        write_fast_config(&dir, "");

        synapse()
            .current_dir(dir.path())
            .arg("--yes")
            .arg("run")
            .arg("build a todo app")
            .arg("--offline")
            .arg("--ui")
            .arg("minimal")
            .assert()
            .success();
        assert!(store_file(&dir, "synapse-workflow").exists());

        synapse()
            .current_dir(dir.path())
            .arg("reset")
            .arg("--force")
            .assert()
            .success()
            .stdout(predicate::str::contains("Reset complete"));

        assert!(!store_file(&dir, "synapse-workflow").exists());
        assert!(!store_file(&dir, "synapse-code-files").exists());

        synapse()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No run recorded yet"));
    }

    #[test]
    fn test_reset_accepts_global_yes() {
        let dir = create_temp_project();

        synapse()
            .current_dir(dir.path())
            .arg("--yes")
            .arg("reset")
            .assert()
            .success()
            .stdout(predicate::str::contains("Reset complete"));
    }
}

// =============================================================================
// Global CLI Flag Tests
// =============================================================================

mod global_flags {
    use super::*;

    #[test]
    fn test_project_dir_flag() {
        let dir = create_temp_project();
        let other_dir = create_temp_project();
        write_fast_config(&dir, "");

        synapse()
            .current_dir(other_dir.path())
            .arg("--project-dir")
            .arg(dir.path())
            .arg("--yes")
            .arg("run")
            .arg("build a todo app")
            .arg("--offline")
            .arg("--ui")
            .arg("minimal")
            .assert()
            .success();

        // All state landed in the target project, not the working directory.
        assert!(store_file(&dir, "synapse-workflow").exists());
        assert!(!other_dir.path().join(".synapse").exists());
    }

    #[test]
    fn test_max_parallel_flag_accepted() {
        let dir = create_temp_project();
        write_fast_config(&dir, "");

        synapse()
            .current_dir(dir.path())
            .arg("--max-parallel")
            .arg("3")
            .arg("--yes")
            .arg("run")
            .arg("build a todo app")
            .arg("--offline")
            .arg("--ui")
            .arg("minimal")
            .assert()
            .success()
            .stdout(predicate::str::contains("Run succeeded:"));
    }
}
